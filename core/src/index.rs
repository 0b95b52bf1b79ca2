use crate::error::{IrError, Result};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub freq: u32,
}

/// Immutable inverted index: lexicon, dense postings table, document
/// lengths and the internal → external document id mapping.
///
/// `postings[t]` is the postings list of term id `t`; lists are strictly
/// ascending by doc id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvertedIndex {
    lexicon: HashMap<String, TermId>,
    postings: Vec<Vec<Posting>>,
    doc_lengths: Vec<u32>,
    doc_nos: Vec<String>,
    avg_doc_len: f64,
}

fn mean_len(doc_lengths: &[u32]) -> f64 {
    if doc_lengths.is_empty() {
        return 0.0;
    }
    let total: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
    total as f64 / doc_lengths.len() as f64
}

impl InvertedIndex {
    /// Assemble an index from loaded artifacts, checking that they agree.
    pub fn from_parts(
        lexicon: HashMap<String, TermId>,
        postings: Vec<Vec<Posting>>,
        doc_lengths: Vec<u32>,
        doc_nos: Vec<String>,
    ) -> Result<Self> {
        if lexicon.len() != postings.len() {
            return Err(IrError::CorruptIndex(format!(
                "lexicon has {} terms but postings table has {}",
                lexicon.len(),
                postings.len()
            )));
        }
        if doc_lengths.len() != doc_nos.len() {
            return Err(IrError::CorruptIndex(format!(
                "{} document lengths but {} docnos",
                doc_lengths.len(),
                doc_nos.len()
            )));
        }
        let mut claimed: Vec<Option<&str>> = vec![None; postings.len()];
        for (term, &id) in &lexicon {
            let Some(slot) = claimed.get_mut(id as usize) else {
                return Err(IrError::CorruptIndex(format!("term {term:?} has out-of-range id {id}")));
            };
            if let Some(other) = slot.replace(term.as_str()) {
                return Err(IrError::CorruptIndex(format!("terms {other:?} and {term:?} share id {id}")));
            }
        }
        let num_docs = doc_lengths.len();
        for (term_id, list) in postings.iter().enumerate() {
            if list.is_empty() {
                return Err(IrError::CorruptIndex(format!("term id {term_id} has no postings")));
            }
            let mut prev: Option<DocId> = None;
            for p in list {
                if p.doc_id as usize >= num_docs || p.freq == 0 || prev.is_some_and(|d| d >= p.doc_id) {
                    return Err(IrError::CorruptIndex(format!(
                        "term id {term_id} has an invalid posting ({}, {})",
                        p.doc_id, p.freq
                    )));
                }
                prev = Some(p.doc_id);
            }
        }
        let avg_doc_len = mean_len(&doc_lengths);
        Ok(Self { lexicon, postings, doc_lengths, doc_nos, avg_doc_len })
    }

    pub fn num_docs(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.lexicon.get(term).copied()
    }

    pub fn postings(&self, term_id: TermId) -> &[Posting] {
        self.postings.get(term_id as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Postings of a term by its token text; `None` if the term is unknown.
    pub fn postings_for(&self, term: &str) -> Option<&[Posting]> {
        self.term_id(term).map(|t| self.postings(t))
    }

    /// Number of documents containing the term.
    pub fn doc_freq(&self, term_id: TermId) -> usize {
        self.postings(term_id).len()
    }

    pub fn doc_len(&self, doc_id: DocId) -> Option<u32> {
        self.doc_lengths.get(doc_id as usize).copied()
    }

    pub fn doc_no(&self, doc_id: DocId) -> Option<&str> {
        self.doc_nos.get(doc_id as usize).map(String::as_str)
    }

    /// Mean document length over the whole collection; 0.0 for an empty index.
    /// Computed once when the index is assembled.
    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    pub fn lexicon(&self) -> &HashMap<String, TermId> {
        &self.lexicon
    }

    pub fn postings_table(&self) -> &[Vec<Posting>] {
        &self.postings
    }

    pub fn doc_lengths(&self) -> &[u32] {
        &self.doc_lengths
    }

    pub fn doc_nos(&self) -> &[String] {
        &self.doc_nos
    }
}

/// Single-pass index builder. Owns the growing lexicon exclusively; call
/// [`IndexBuilder::finish`] to freeze it into an [`InvertedIndex`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    tokenizer: Tokenizer,
    lexicon: HashMap<String, TermId>,
    postings: Vec<Vec<Posting>>,
    doc_lengths: Vec<u32>,
    doc_nos: Vec<String>,
}

impl IndexBuilder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer, ..Self::default() }
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    /// Tokenize and index one document, returning its internal id.
    pub fn add_document(&mut self, doc_no: impl Into<String>, text: &str) -> DocId {
        let tokens = self.tokenizer.tokenize(text);
        self.add_tokens(doc_no, &tokens)
    }

    /// Index an already tokenized document.
    pub fn add_tokens<S: AsRef<str>>(&mut self, doc_no: impl Into<String>, tokens: &[S]) -> DocId {
        let doc_id = self.doc_lengths.len() as DocId;

        let mut tf_counts: BTreeMap<TermId, u32> = BTreeMap::new();
        for token in tokens {
            let tid = self.intern(token.as_ref());
            *tf_counts.entry(tid).or_insert(0) += 1;
        }
        for (tid, freq) in tf_counts {
            self.postings[tid as usize].push(Posting { doc_id, freq });
        }

        self.doc_lengths.push(tokens.len() as u32);
        self.doc_nos.push(doc_no.into());
        doc_id
    }

    fn intern(&mut self, token: &str) -> TermId {
        if let Some(&tid) = self.lexicon.get(token) {
            return tid;
        }
        let tid = self.postings.len() as TermId;
        self.lexicon.insert(token.to_string(), tid);
        self.postings.push(Vec::new());
        tid
    }

    pub fn num_docs(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    pub fn finish(self) -> InvertedIndex {
        InvertedIndex {
            lexicon: self.lexicon,
            postings: self.postings,
            avg_doc_len: mean_len(&self.doc_lengths),
            doc_lengths: self.doc_lengths,
            doc_nos: self.doc_nos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn toy() -> InvertedIndex {
        let mut b = IndexBuilder::new(Tokenizer::default());
        b.add_document("D0", "a b a");
        b.add_document("D1", "b c");
        b.add_document("D2", "a c c");
        b.finish()
    }

    #[test]
    fn toy_corpus_artifacts() {
        let idx = toy();
        assert_eq!(idx.term_id("a"), Some(0));
        assert_eq!(idx.term_id("b"), Some(1));
        assert_eq!(idx.term_id("c"), Some(2));
        assert_eq!(
            idx.postings(0),
            &[Posting { doc_id: 0, freq: 2 }, Posting { doc_id: 2, freq: 1 }]
        );
        assert_eq!(idx.doc_lengths(), &[3, 2, 3]);
        assert_eq!(idx.doc_nos(), &["D0", "D1", "D2"]);
        assert!((idx.avg_doc_len() - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_document_still_gets_an_id() {
        let mut b = IndexBuilder::default();
        assert_eq!(b.add_document("E", "  ,, "), 0);
        assert_eq!(b.add_document("F", "x"), 1);
        let idx = b.finish();
        assert_eq!(idx.doc_lengths(), &[0, 1]);
        assert_eq!(idx.postings(0), &[Posting { doc_id: 1, freq: 1 }]);
    }

    #[test]
    fn from_parts_rejects_unsorted_postings() {
        let idx = toy();
        let mut postings = idx.postings_table().to_vec();
        postings[0].reverse();
        let err = InvertedIndex::from_parts(
            idx.lexicon().clone(),
            postings,
            idx.doc_lengths().to_vec(),
            idx.doc_nos().to_vec(),
        );
        assert!(matches!(err, Err(IrError::CorruptIndex(_))));
    }

    #[test]
    fn from_parts_rejects_shared_term_ids() {
        let idx = toy();
        let mut lexicon = idx.lexicon().clone();
        lexicon.insert("b".to_string(), 0);
        let err = InvertedIndex::from_parts(
            lexicon,
            idx.postings_table().to_vec(),
            idx.doc_lengths().to_vec(),
            idx.doc_nos().to_vec(),
        );
        assert!(matches!(err, Err(IrError::CorruptIndex(_))));
    }

    #[test]
    fn from_parts_keeps_mean_length() {
        let idx = toy();
        let rebuilt = InvertedIndex::from_parts(
            idx.lexicon().clone(),
            idx.postings_table().to_vec(),
            idx.doc_lengths().to_vec(),
            idx.doc_nos().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, idx);
        assert!((rebuilt.avg_doc_len() - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(InvertedIndex::default().avg_doc_len(), 0.0);
    }

    proptest! {
        #[test]
        fn postings_account_for_every_occurrence(
            docs in prop::collection::vec(prop::collection::vec("[a-e]{1,2}", 0..15), 0..20),
        ) {
            let mut b = IndexBuilder::default();
            for (i, terms) in docs.iter().enumerate() {
                b.add_tokens(format!("D{i}"), terms);
            }
            let idx = b.finish();

            let mut occurrences: HashMap<&str, u64> = HashMap::new();
            for terms in &docs {
                for t in terms {
                    *occurrences.entry(t.as_str()).or_insert(0) += 1;
                }
            }
            prop_assert_eq!(idx.num_terms(), occurrences.len());
            for (term, count) in occurrences {
                let list = idx.postings_for(term).unwrap();
                let total: u64 = list.iter().map(|p| p.freq as u64).sum();
                prop_assert_eq!(total, count);
                prop_assert!(list.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
                prop_assert!(list.iter().all(|p| p.freq >= 1));
            }
            let lens: Vec<u32> = docs.iter().map(|d| d.len() as u32).collect();
            prop_assert_eq!(idx.doc_lengths(), lens.as_slice());
        }

        #[test]
        fn term_ids_follow_first_occurrence(
            docs in prop::collection::vec(prop::collection::vec("[a-h]", 0..10), 0..10),
        ) {
            let mut b = IndexBuilder::default();
            for terms in &docs {
                b.add_tokens("d", terms);
            }
            let idx = b.finish();
            let mut order: Vec<&str> = Vec::new();
            for t in docs.iter().flatten() {
                if !order.contains(&t.as_str()) {
                    order.push(t);
                }
            }
            for (expected, term) in order.iter().enumerate() {
                prop_assert_eq!(idx.term_id(term), Some(expected as TermId));
            }
        }
    }
}
