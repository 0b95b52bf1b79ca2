mod corpus;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use corpus::{CorpusDoc, CorpusFormat};
use ircore::persist::{save_index, IndexPaths};
use ircore::{IndexBuilder, IrError, Tokenizer};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a BM25/Boolean inverted index from a tagged corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus file or a directory of corpus files
    Build {
        /// Input path: .gz / .sgml / .trec <DOC> stream, .json, .jsonl, or a directory of them
        #[arg(long)]
        input: String,
        /// Output index directory; must not already hold an index
        #[arg(long)]
        output: String,
        /// Stem tokens (queries against this index are stemmed to match)
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stem } => build_index(Path::new(&input), Path::new(&output), stem),
    }
}

fn build_index(input: &Path, output: &Path, stem: bool) -> Result<()> {
    let out_paths = IndexPaths::new(output);
    out_paths.ensure_fresh()?;
    let files = corpus_files(input)?;

    let mut builder = IndexBuilder::new(Tokenizer::new(stem));
    for (file, format) in &files {
        tracing::info!(file = %file.display(), ?format, "reading corpus file");
        for doc in corpus::open(file, *format)? {
            ingest_doc(&mut builder, doc?);
        }
    }
    tracing::info!(num_docs = builder.num_docs(), num_terms = builder.num_terms(), "ingested documents");

    let index = builder.finish();
    save_index(&out_paths, &index, stem)?;
    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

fn ingest_doc(builder: &mut IndexBuilder, doc: CorpusDoc) {
    let doc_id = builder.add_document(doc.doc_no, &doc.text);
    if (doc_id + 1) % 10_000 == 0 {
        tracing::info!(indexed = doc_id + 1, num_terms = builder.num_terms(), "progress");
    }
}

/// Resolve the input into corpus files in a stable order.
fn corpus_files(input: &Path) -> Result<Vec<(PathBuf, CorpusFormat)>> {
    if input.is_file() {
        let format = CorpusFormat::from_path(input).unwrap_or(CorpusFormat::Trec);
        return Ok(vec![(input.to_path_buf(), format)]);
    }
    if !input.is_dir() {
        return Err(IrError::MissingPath(input.to_path_buf()).into());
    }
    let mut files: Vec<(PathBuf, CorpusFormat)> = WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| CorpusFormat::from_path(e.path()).map(|f| (e.into_path(), f)))
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    if files.is_empty() {
        bail!("no corpus files found under {}", input.display());
    }
    Ok(files)
}
