use crate::error::IrError;
use crate::{DocId, InvertedIndex, Posting, TermId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub stemmed: bool,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn for_index(index: &InvertedIndex, stemmed: bool) -> Self {
        Self {
            num_docs: index.num_docs() as u32,
            num_terms: index.num_terms() as u32,
            stemmed,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DocNoFile {
    doc_nos: Vec<String>,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn lexicon(&self) -> PathBuf { self.root.join("lexicon.json") }
    pub fn postings(&self) -> PathBuf { self.root.join("inverted-index.json") }
    pub fn doc_lengths(&self) -> PathBuf { self.root.join("doc-lengths.txt") }
    pub fn doc_nos(&self) -> PathBuf { self.root.join("docnos.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    fn artifacts(&self) -> [PathBuf; 5] {
        [self.lexicon(), self.postings(), self.doc_lengths(), self.doc_nos(), self.meta()]
    }

    /// Fail if any index artifact is already present under the root.
    pub fn ensure_fresh(&self) -> Result<(), IrError> {
        if self.artifacts().iter().any(|p| p.exists()) {
            return Err(IrError::IndexExists(self.root.clone()));
        }
        Ok(())
    }
}

pub fn save_lexicon(paths: &IndexPaths, lexicon: &HashMap<String, TermId>) -> Result<()> {
    let ordered: BTreeMap<&str, TermId> = lexicon.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    write_json(&paths.lexicon(), &ordered)
}

pub fn load_lexicon(paths: &IndexPaths) -> Result<HashMap<String, TermId>> {
    read_json(&paths.lexicon())
}

/// Persist postings as `term id -> [doc, freq, doc, freq, ...]`.
pub fn save_postings(paths: &IndexPaths, postings: &[Vec<Posting>]) -> Result<()> {
    let flat: BTreeMap<TermId, Vec<u32>> = postings
        .iter()
        .enumerate()
        .map(|(tid, list)| {
            let pairs = list.iter().flat_map(|p| [p.doc_id, p.freq]).collect();
            (tid as TermId, pairs)
        })
        .collect();
    write_json(&paths.postings(), &flat)
}

pub fn load_postings(paths: &IndexPaths) -> Result<Vec<Vec<Posting>>> {
    let flat: BTreeMap<TermId, Vec<u32>> = read_json(&paths.postings())?;
    let mut table = Vec::with_capacity(flat.len());
    for (expected, (tid, pairs)) in flat.into_iter().enumerate() {
        if tid as usize != expected {
            return Err(IrError::CorruptIndex(format!("postings keys skip term id {expected}")).into());
        }
        if pairs.len() % 2 != 0 {
            return Err(IrError::CorruptIndex(format!("postings for term id {tid} have odd length")).into());
        }
        let list = pairs
            .chunks_exact(2)
            .map(|pair| Posting { doc_id: pair[0] as DocId, freq: pair[1] })
            .collect();
        table.push(list);
    }
    Ok(table)
}

pub fn save_doc_lengths(paths: &IndexPaths, lengths: &[u32]) -> Result<()> {
    let mut f = BufWriter::new(File::create(paths.doc_lengths())?);
    for len in lengths {
        writeln!(f, "{len}")?;
    }
    f.flush()?;
    Ok(())
}

pub fn load_doc_lengths(paths: &IndexPaths) -> Result<Vec<u32>> {
    let path = paths.doc_lengths();
    let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut lengths = Vec::new();
    for (line_no, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        let len = line.trim().parse::<u32>().map_err(|_| {
            IrError::CorruptIndex(format!("doc-lengths line {}: {line:?} is not a length", line_no + 1))
        })?;
        lengths.push(len);
    }
    Ok(lengths)
}

pub fn save_doc_nos(paths: &IndexPaths, doc_nos: &[String]) -> Result<()> {
    write_json(&paths.doc_nos(), &DocNoFile { doc_nos: doc_nos.to_vec() })
}

pub fn load_doc_nos(paths: &IndexPaths) -> Result<Vec<String>> {
    let file: DocNoFile = read_json(&paths.doc_nos())?;
    Ok(file.doc_nos)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    write_json(&paths.meta(), meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    read_json(&paths.meta())
}

/// Write every artifact of a finished build. The meta file goes last so a
/// half-written index is never mistaken for a complete one.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, stemmed: bool) -> Result<MetaFile> {
    paths.ensure_fresh()?;
    create_dir_all(&paths.root)?;
    save_lexicon(paths, index.lexicon())?;
    save_postings(paths, index.postings_table())?;
    save_doc_lengths(paths, index.doc_lengths())?;
    save_doc_nos(paths, index.doc_nos())?;
    let meta = MetaFile::for_index(index, stemmed);
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index saved");
    Ok(meta)
}

/// Load the whole index into memory and check the artifacts against each other.
pub fn load_index(paths: &IndexPaths) -> Result<(InvertedIndex, MetaFile)> {
    if !paths.root.is_dir() {
        return Err(IrError::MissingPath(paths.root.clone()).into());
    }
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(IrError::CorruptIndex(format!("unsupported index version {}", meta.version)).into());
    }
    let index = InvertedIndex::from_parts(
        load_lexicon(paths)?,
        load_postings(paths)?,
        load_doc_lengths(paths)?,
        load_doc_nos(paths)?,
    )?;
    if index.num_docs() != meta.num_docs as usize {
        return Err(IrError::CorruptIndex(format!(
            "meta.json records {} documents, artifacts hold {}",
            meta.num_docs,
            index.num_docs()
        ))
        .into());
    }
    tracing::debug!(root = %paths.root.display(), num_docs = index.num_docs(), "index loaded");
    Ok((index, meta))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut f = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    serde_json::to_writer_pretty(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}
