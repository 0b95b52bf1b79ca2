use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Splits text into lowercase alphanumeric runs, optionally stemming each token.
///
/// The same configuration must be used for building an index and for
/// tokenizing queries against it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenizer {
    pub stem: bool,
}

impl Tokenizer {
    pub fn new(stem: bool) -> Self {
        Self { stem }
    }

    /// Tokenize a single piece of text.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        self.tokenize_into(text, &mut tokens);
        tokens
    }

    /// Tokenize a sequence of chunks into one flat token stream. A chunk
    /// boundary always separates tokens.
    pub fn tokenize_chunks<I, S>(&self, chunks: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = Vec::new();
        for chunk in chunks {
            self.tokenize_into(chunk.as_ref(), &mut tokens);
        }
        tokens
    }

    fn tokenize_into(&self, text: &str, out: &mut Vec<String>) {
        let start = out.len();
        split_alphanumeric(text, out);
        if self.stem {
            for token in &mut out[start..] {
                let stemmed = STEMMER.stem(token).into_owned();
                *token = stemmed;
            }
        }
    }
}

/// Unstemmed tokenization, equivalent to `Tokenizer::default().tokenize(text)`.
pub fn tokenize(text: &str) -> Vec<String> {
    Tokenizer::default().tokenize(text)
}

fn split_alphanumeric(text: &str, out: &mut Vec<String>) {
    let lowered = text.to_lowercase();
    let mut current = String::new();
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            current.push(ch);
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}
