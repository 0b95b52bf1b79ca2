//! Inverted index construction, BM25 and Boolean-AND retrieval, and
//! rank-based evaluation of TREC-style runs.

pub mod bm25;
pub mod boolean;
pub mod error;
pub mod eval;
pub mod index;
pub mod persist;
pub mod queries;
pub mod run;
pub mod tokenizer;

pub use error::IrError;
pub use index::{DocId, IndexBuilder, InvertedIndex, Posting, TermId};
pub use tokenizer::Tokenizer;
