use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ircore::bm25::Bm25Params;
use ircore::persist::{save_index, IndexPaths};
use ircore::{IndexBuilder, InvertedIndex, Tokenizer};
use serde_json::Value;
use server::{build_app, build_router, AppState};
use tempfile::tempdir;
use tower::ServiceExt;

fn tiny_index() -> InvertedIndex {
    let mut b = IndexBuilder::new(Tokenizer::default());
    b.add_document("doc0", "Rust is great. rust systems.");
    b.add_document("doc1", "Learning rust the hard way over many evenings.");
    b.add_document("doc2", "Gardening tips for spring.");
    b.add_document("doc3", "Baking sourdough bread at home.");
    b.add_document("doc4", "Systems thinking in ecology.");
    b.finish()
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn in_memory_app() -> Router {
    build_router(AppState::new(tiny_index(), Tokenizer::default(), Bm25Params::default()))
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (status, json) = call(in_memory_app(), "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"].as_u64(), Some(2));
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["docno"], "doc0");
    assert_eq!(arr[0]["rank"], 1);
    assert_eq!(arr[1]["docno"], "doc1");
}

#[tokio::test]
async fn search_with_unknown_terms_is_empty() {
    let (status, json) = call(in_memory_app(), "/search?q=zeppelin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"].as_u64(), Some(0));
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn and_requires_every_term() {
    let (_, json) = call(in_memory_app(), "/and?q=rust%20systems").await;
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["docno"], "doc0");
    assert_eq!(arr[0]["score"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn doc_lookup() {
    let (status, json) = call(in_memory_app(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["docno"], "doc1");
    assert_eq!(json["length"], 8);

    let (status, _) = call(in_memory_app(), "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn serves_an_index_loaded_from_disk() {
    let dir = tempdir().unwrap();
    save_index(&IndexPaths::new(dir.path()), &tiny_index(), false).unwrap();
    let app = build_app(&dir.path().to_string_lossy(), Bm25Params::default()).unwrap();
    let (status, json) = call(app, "/search?q=Learning").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["docno"], "doc1");
}
