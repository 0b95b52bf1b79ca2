use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use ircore::bm25::{Bm25Params, Bm25Scorer, RankedDoc};
use ircore::boolean::boolean_and;
use ircore::persist::{load_index, IndexPaths};
use ircore::{DocId, InvertedIndex, Tokenizer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub rank: u32,
    pub doc_id: DocId,
    pub docno: String,
    pub score: f64,
}

/// Shared, read-only query state. The index is loaded once and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<InvertedIndex>,
    pub tokenizer: Tokenizer,
    pub params: Bm25Params,
}

impl AppState {
    pub fn new(index: InvertedIndex, tokenizer: Tokenizer, params: Bm25Params) -> Self {
        Self { index: Arc::new(index), tokenizer, params }
    }
}

/// Load an index directory and build the router over it.
pub fn build_app(index_dir: &str, params: Bm25Params) -> Result<Router> {
    let (index, meta) = load_index(&IndexPaths::new(index_dir))?;
    tracing::info!(index_dir, num_docs = index.num_docs(), num_terms = index.num_terms(), "index loaded");
    Ok(build_router(AppState::new(index, Tokenizer::new(meta.stemmed), params)))
}

/// Router over an index already held in memory.
pub fn build_router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/and", get(and_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = Instant::now();
    let tokens = state.tokenizer.tokenize(&params.q);
    let ranked = Bm25Scorer::new(&state.index, state.params).rank(&tokens, usize::MAX);
    Json(respond(&state.index, params, ranked, start))
}

pub async fn and_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = Instant::now();
    let tokens = state.tokenizer.tokenize(&params.q);
    let ranked = boolean_and(&state.index, &tokens);
    Json(respond(&state.index, params, ranked, start))
}

fn respond(index: &InvertedIndex, params: SearchParams, ranked: Vec<RankedDoc>, start: Instant) -> SearchResponse {
    let total_hits = ranked.len();
    let k = params.k.clamp(1, MAX_K);
    let results = ranked
        .into_iter()
        .take(k)
        .filter_map(|r| {
            let docno = index.doc_no(r.doc_id)?.to_string();
            Some(SearchHit { rank: r.rank, doc_id: r.doc_id, docno, score: r.score })
        })
        .collect();
    SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), total_hits, results }
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match (state.index.doc_no(doc_id), state.index.doc_len(doc_id)) {
        (Some(docno), Some(length)) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "docno": docno,
            "length": length,
        }))),
        _ => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}
