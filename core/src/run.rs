use crate::bm25::RankedDoc;
use crate::error::IrError;
use crate::index::InvertedIndex;
use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MAX_RUN_TAG_LEN: usize = 12;

/// One line of a TREC run file: `topic Q0 docno rank score tag`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLine {
    pub topic: u32,
    pub doc_no: String,
    pub rank: u32,
    pub score: f64,
    pub run_tag: String,
}

impl fmt::Display for RunLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q0 {} {} {} {}", self.topic, self.doc_no, self.rank, self.score, self.run_tag)
    }
}

pub fn is_valid_run_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.chars().count() <= MAX_RUN_TAG_LEN && tag.chars().all(char::is_alphanumeric)
}

pub fn validate_run_tag(tag: &str) -> Result<(), IrError> {
    if is_valid_run_tag(tag) {
        Ok(())
    } else {
        Err(IrError::InvalidArgument(format!(
            "run tag {tag:?} must be 1-{MAX_RUN_TAG_LEN} alphanumeric characters"
        )))
    }
}

/// Turn ranked internal ids into run lines for one topic.
pub fn to_run_lines(index: &InvertedIndex, topic: u32, ranked: &[RankedDoc], run_tag: &str) -> Vec<RunLine> {
    ranked
        .iter()
        .filter_map(|r| {
            let doc_no = index.doc_no(r.doc_id)?;
            Some(RunLine { topic, doc_no: doc_no.to_string(), rank: r.rank, score: r.score, run_tag: run_tag.to_string() })
        })
        .collect()
}

/// Run files always carry a `.txt` suffix.
pub fn with_txt_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("txt") {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_owned();
        s.push(".txt");
        PathBuf::from(s)
    }
}

pub fn write_run(path: &Path, lines: &[RunLine]) -> Result<()> {
    let mut f = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    for line in lines {
        writeln!(f, "{line}")?;
    }
    f.flush()?;
    Ok(())
}
