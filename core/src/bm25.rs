use crate::error::{IrError, Result};
use crate::index::{DocId, InvertedIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Params {
    pub fn new(k1: f64, b: f64) -> Result<Self> {
        if !k1.is_finite() || k1 < 0.0 {
            return Err(IrError::InvalidArgument(format!("k1 must be >= 0, got {k1}")));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(IrError::InvalidArgument(format!("b must be in [0, 1], got {b}")));
        }
        Ok(Self { k1, b })
    }
}

/// One entry of a ranked result list. `rank` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedDoc {
    pub doc_id: DocId,
    pub rank: u32,
    pub score: f64,
}

/// BM25 contribution of a single term to a single document.
pub fn term_score(fi: u32, n: usize, ni: usize, dl: u32, avdl: f64, params: Bm25Params) -> f64 {
    let k = params.k1 * ((1.0 - params.b) + params.b * (dl as f64 / avdl));
    let saturation = fi as f64 / (fi as f64 + k);
    let idf = ((n as f64 - ni as f64 + 0.5) / (ni as f64 + 0.5)).ln();
    idf * saturation
}

/// Scores queries against a fully loaded index.
pub struct Bm25Scorer<'a> {
    index: &'a InvertedIndex,
    params: Bm25Params,
    avdl: f64,
}

impl<'a> Bm25Scorer<'a> {
    pub fn new(index: &'a InvertedIndex, params: Bm25Params) -> Self {
        Self { index, params, avdl: index.avg_doc_len() }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Accumulated score per candidate document. Tokens missing from the
    /// lexicon contribute nothing; repeated tokens are counted once per
    /// occurrence.
    pub fn score(&self, tokens: &[String]) -> HashMap<DocId, f64> {
        let mut scores: HashMap<DocId, f64> = HashMap::new();
        let n = self.index.num_docs();
        if n == 0 {
            return scores;
        }
        for token in tokens {
            let Some(tid) = self.index.term_id(token) else { continue };
            let postings = self.index.postings(tid);
            let ni = postings.len();
            for p in postings {
                let dl = self.index.doc_len(p.doc_id).unwrap_or(0);
                *scores.entry(p.doc_id).or_insert(0.0) += term_score(p.freq, n, ni, dl, self.avdl, self.params);
            }
        }
        scores
    }

    /// Top `k` documents by score descending, ties broken by ascending doc id.
    pub fn rank(&self, tokens: &[String], k: usize) -> Vec<RankedDoc> {
        let mut scored: Vec<(DocId, f64)> = self.score(tokens).into_iter().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
            .into_iter()
            .enumerate()
            .map(|(i, (doc_id, score))| RankedDoc { doc_id, rank: i as u32 + 1, score })
            .collect()
    }
}
