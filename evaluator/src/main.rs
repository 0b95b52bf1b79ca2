use anyhow::{Context, Result};
use clap::Parser;
use ircore::eval::{evaluate_run_file, mean_scores, Qrels, RunOutcome, TopicRange};
use ircore::IrError;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "evaluator")]
#[command(about = "Score TREC run files against relevance judgments (AP, P@10, NDCG@10, NDCG@1000)")]
struct Args {
    /// Judgments file: `topic iteration docno grade` per line
    #[arg(long)]
    qrels: PathBuf,
    /// Run files, or directories of run files
    #[arg(long, num_args = 1.., required = true)]
    runs: Vec<PathBuf>,
    /// Directory receiving one `<run file>_scores.txt` per run
    #[arg(long, default_value = "./scores")]
    output: PathBuf,
    /// Lowest judgment topic id accepted
    #[arg(long)]
    min_topic: Option<u64>,
    /// Highest judgment topic id accepted
    #[arg(long)]
    max_topic: Option<u64>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let range = TopicRange { min: args.min_topic, max: args.max_topic };
    let summary = evaluate_all(&args.qrels, &args.runs, &args.output, range)?;
    tracing::info!(scored = summary.scored, bad_format = summary.bad_format, "evaluation complete");
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    scored: usize,
    bad_format: usize,
}

fn evaluate_all(qrels_path: &Path, runs: &[PathBuf], output: &Path, range: TopicRange) -> Result<Summary> {
    let qrels = load_qrels(qrels_path, range)?;
    let run_files = collect_run_files(runs)?;
    check_distinct_names(&run_files)?;
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    let mut summary = Summary::default();
    for run_path in &run_files {
        let outcome = evaluate_run_file(&qrels, run_path);
        match &outcome {
            RunOutcome::Scored(scores) => {
                summary.scored += 1;
                if let Some(m) = mean_scores(scores) {
                    tracing::info!(
                        run = %run_path.display(),
                        map = m.map,
                        p10 = m.p10,
                        ndcg10 = m.ndcg10,
                        ndcg1000 = m.ndcg1000,
                        "run scored"
                    );
                }
            }
            RunOutcome::BadFormat(e) => {
                summary.bad_format += 1;
                tracing::warn!(run = %run_path.display(), error = %e, "run file is improperly formatted");
            }
        }
        let out_path = output.join(scores_file_name(run_path));
        fs::write(&out_path, outcome.render()).with_context(|| format!("writing {}", out_path.display()))?;
    }
    Ok(summary)
}

/// A malformed judgments file leaves nothing to score against, so it is fatal.
fn load_qrels(path: &Path, range: TopicRange) -> Result<Qrels> {
    if !path.is_file() {
        return Err(IrError::MissingPath(path.to_path_buf()).into());
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let qrels = Qrels::parse(&text, range)
        .map_err(|e| IrError::InvalidArgument(format!("qrels file {} is improperly formatted: {e}", path.display())))?;
    Ok(qrels)
}

fn collect_run_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            return Err(IrError::MissingPath(input.clone()).into());
        }
    }
    Ok(files)
}

/// Scores files are named after the run file, so two runs sharing a file name
/// would overwrite each other's output.
fn check_distinct_names(run_files: &[PathBuf]) -> Result<()> {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for path in run_files {
        if let Some(first) = seen.insert(scores_file_name(path), path) {
            return Err(IrError::InvalidArgument(format!(
                "run files {} and {} would both write {}",
                first.display(),
                path.display(),
                scores_file_name(path)
            ))
            .into());
        }
    }
    Ok(())
}

fn scores_file_name(run_path: &Path) -> String {
    let name = run_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{name}_scores.txt")
}
