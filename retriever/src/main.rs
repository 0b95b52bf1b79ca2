use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ircore::bm25::{Bm25Params, Bm25Scorer};
use ircore::boolean::boolean_and;
use ircore::persist::{load_index, IndexPaths};
use ircore::queries::{extract_topics, load_queries, Queries};
use ircore::run::{to_run_lines, validate_run_tag, with_txt_extension, write_run, RunLine};
use ircore::{InvertedIndex, IrError, Tokenizer};
use tracing_subscriber::{fmt, EnvFilter};

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "retriever")]
#[command(about = "Run batch BM25 or Boolean-AND retrieval and write TREC run files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct BatchArgs {
    /// Index directory produced by `indexer build`
    #[arg(long)]
    index: PathBuf,
    /// JSON file mapping topic id to query text
    #[arg(long)]
    queries: PathBuf,
    /// Run file to write (".txt" is appended when missing)
    #[arg(long)]
    output: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank documents with BM25
    Bm25 {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, default_value_t = 1.2)]
        k1: f64,
        #[arg(long, default_value_t = 0.75)]
        b: f64,
        /// Maximum results per topic
        #[arg(long, default_value_t = 1000)]
        top_k: usize,
        #[arg(long, default_value = "bm25")]
        run_tag: String,
    },
    /// Retrieve documents containing every query term
    And {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, default_value = "booleanAND")]
        run_tag: String,
    },
    /// Extract `<number>`/`<title>` topics into a queries JSON file
    Topics {
        #[arg(long)]
        base_file: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Topic ids to leave out, comma separated
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<u32>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Bm25 { params: Bm25Params, top_k: usize },
    BooleanAnd,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Bm25 { batch, k1, b, top_k, run_tag } => {
            let params = Bm25Params::new(k1, b)?;
            run_batch(&batch, Strategy::Bm25 { params, top_k }, &run_tag)
        }
        Commands::And { batch, run_tag } => run_batch(&batch, Strategy::BooleanAnd, &run_tag),
        Commands::Topics { base_file, output, exclude } => write_topics(&base_file, &output, &exclude),
    }
}

fn run_batch(args: &BatchArgs, strategy: Strategy, run_tag: &str) -> Result<()> {
    validate_run_tag(run_tag)?;
    for path in [&args.index, &args.queries] {
        if !path.exists() {
            return Err(IrError::MissingPath(path.clone()).into());
        }
    }
    let queries = load_queries(&args.queries)?;
    let (index, meta) = load_index(&IndexPaths::new(&args.index))?;
    tracing::info!(num_docs = index.num_docs(), topics = queries.len(), stemmed = meta.stemmed, ?strategy, "loaded index");

    let lines = retrieve(&index, Tokenizer::new(meta.stemmed), &queries, strategy, run_tag);
    let output = with_txt_extension(&args.output);
    write_run(&output, &lines)?;
    tracing::info!(output = %output.display(), lines = lines.len(), "run written");
    Ok(())
}

/// Answer every topic with the chosen strategy, in ascending topic order.
fn retrieve(index: &InvertedIndex, tokenizer: Tokenizer, queries: &Queries, strategy: Strategy, run_tag: &str) -> Vec<RunLine> {
    let bm25 = match strategy {
        Strategy::Bm25 { params, top_k } => Some((Bm25Scorer::new(index, params), top_k)),
        Strategy::BooleanAnd => None,
    };
    let mut lines = Vec::new();
    for (&topic, text) in queries {
        let tokens = tokenizer.tokenize(text);
        let ranked = match &bm25 {
            Some((scorer, top_k)) => scorer.rank(&tokens, *top_k),
            None => boolean_and(index, &tokens),
        };
        if ranked.is_empty() {
            tracing::debug!(topic, "no results");
        }
        lines.extend(to_run_lines(index, topic, &ranked, run_tag));
    }
    lines
}

fn write_topics(base_file: &Path, output: &Path, exclude: &[u32]) -> Result<()> {
    let text = std::fs::read_to_string(base_file).with_context(|| format!("reading {}", base_file.display()))?;
    let exclude: HashSet<u32> = exclude.iter().copied().collect();
    let queries = extract_topics(&text, &exclude);
    let f = BufWriter::new(File::create(output).with_context(|| format!("creating {}", output.display()))?);
    serde_json::to_writer_pretty(f, &queries)?;
    tracing::info!(topics = queries.len(), output = %output.display(), "queries saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ircore::persist::save_index;
    use ircore::IndexBuilder;
    use tempfile::tempdir;

    fn index() -> InvertedIndex {
        let mut b = IndexBuilder::default();
        b.add_document("D0", "a b a");
        b.add_document("D1", "b c");
        b.add_document("D2", "a c c");
        b.finish()
    }

    fn queries() -> Queries {
        [(402, "a b".to_string()), (401, "c".to_string()), (403, "zzz".to_string())].into_iter().collect()
    }

    #[test]
    fn boolean_batch_lines() {
        let lines = retrieve(&index(), Tokenizer::default(), &queries(), Strategy::BooleanAnd, "booleanAND");
        let rendered: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(rendered, vec![
            "401 Q0 D1 1 1 booleanAND",
            "401 Q0 D2 2 0 booleanAND",
            "402 Q0 D0 1 0 booleanAND",
        ]);
    }

    #[test]
    fn bm25_batch_respects_top_k() {
        let strategy = Strategy::Bm25 { params: Bm25Params::default(), top_k: 1 };
        let lines = retrieve(&index(), Tokenizer::default(), &queries(), strategy, "bm25");
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.rank == 1));
    }

    #[test]
    fn batch_writes_run_file() {
        let dir = tempdir().unwrap();
        let index_dir = dir.path().join("index");
        save_index(&IndexPaths::new(&index_dir), &index(), false).unwrap();
        let queries_path = dir.path().join("queries.json");
        std::fs::write(&queries_path, r#"{"401": "c"}"#).unwrap();
        let args = BatchArgs { index: index_dir, queries: queries_path, output: dir.path().join("run") };

        run_batch(&args, Strategy::BooleanAnd, "booleanAND").unwrap();
        let written = std::fs::read_to_string(dir.path().join("run.txt")).unwrap();
        assert_eq!(written, "401 Q0 D1 1 1 booleanAND\n401 Q0 D2 2 0 booleanAND\n");

        let err = run_batch(&args, Strategy::BooleanAnd, "not valid!").unwrap_err();
        assert!(matches!(err.downcast_ref::<IrError>(), Some(IrError::InvalidArgument(_))));
    }

    #[test]
    fn missing_index_is_fatal() {
        let dir = tempdir().unwrap();
        let args = BatchArgs {
            index: dir.path().join("none"),
            queries: dir.path().join("q.json"),
            output: dir.path().join("run"),
        };
        let err = run_batch(&args, Strategy::BooleanAnd, "x").unwrap_err();
        assert!(matches!(err.downcast_ref::<IrError>(), Some(IrError::MissingPath(_))));
    }
}
