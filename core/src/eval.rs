//! Rank-based evaluation of TREC runs against relevance judgments.
//!
//! Judgment and run files are validated line by line. A single bad line
//! makes the whole file unusable, which is reported as a
//! [`FormatError`] value rather than an `Err` that unwinds the caller.

use crate::run::{is_valid_run_tag, RunLine};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Depth of the ranking considered by average precision.
pub const AP_DEPTH: usize = 1000;
pub const PRECISION_DEPTH: usize = 10;
pub const NDCG_SHALLOW: usize = 10;
pub const NDCG_DEEP: usize = 1000;

pub const SCORES_HEADER: &str = "Topic,Average Precision,P@10,NDCG@10,NDCG@1000";
pub const BAD_FORMAT_LINE: &str = "bad format,bad format,bad format,bad format";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct FormatError {
    /// 1-based line number, 0 when the file could not be read at all.
    pub line: usize,
    pub reason: String,
}

impl FormatError {
    fn at(line: usize, reason: impl Into<String>) -> Self {
        Self { line, reason: reason.into() }
    }
}

/// Topic id as it appears in judgment and run files.
pub type Topic = u64;

/// Inclusive bounds on accepted judgment topic ids. Unbounded by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicRange {
    pub min: Option<Topic>,
    pub max: Option<Topic>,
}

impl TopicRange {
    pub fn contains(&self, topic: Topic) -> bool {
        self.min.map_or(true, |m| topic >= m) && self.max.map_or(true, |m| topic <= m)
    }
}

#[derive(Debug, Default, Clone)]
struct TopicJudgments {
    grades: HashMap<String, u64>,
    /// Judgment lines with a positive grade, repeated lines included.
    relevant: usize,
    /// All grades of the topic, highest first.
    ideal: Vec<u64>,
}

/// Relevance judgments keyed by topic.
#[derive(Debug, Default, Clone)]
pub struct Qrels {
    topics: BTreeMap<Topic, TopicJudgments>,
}

impl Qrels {
    /// Parse `topic iteration docno grade` lines.
    pub fn parse(text: &str, range: TopicRange) -> Result<Self, FormatError> {
        let mut raw: BTreeMap<Topic, TopicJudgments> = BTreeMap::new();
        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [topic, _iteration, doc_no, grade] = fields.as_slice() else {
                return Err(FormatError::at(line_no, format!("expected 4 fields, found {}", fields.len())));
            };
            let topic = parse_digits(topic)
                .filter(|t| range.contains(*t))
                .ok_or_else(|| FormatError::at(line_no, format!("invalid topic {topic:?}")))?;
            let grade = parse_digits(grade)
                .ok_or_else(|| FormatError::at(line_no, format!("invalid judgment {grade:?}")))?;
            let judgments = raw.entry(topic).or_default();
            judgments.grades.insert(doc_no.to_string(), grade);
            if grade > 0 {
                judgments.relevant += 1;
            }
        }

        for judgments in raw.values_mut() {
            judgments.ideal = judgments.grades.values().copied().collect();
            judgments.ideal.sort_unstable_by(|a, b| b.cmp(a));
        }
        Ok(Self { topics: raw })
    }

    /// Judged topics in ascending order.
    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.topics.keys().copied()
    }

    /// Grade of a document for a topic; unjudged documents grade 0.
    pub fn grade(&self, topic: Topic, doc_no: &str) -> u64 {
        self.topics
            .get(&topic)
            .and_then(|t| t.grades.get(doc_no))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_relevant(&self, topic: Topic, doc_no: &str) -> bool {
        self.grade(topic, doc_no) > 0
    }

    pub fn total_relevant(&self, topic: Topic) -> usize {
        self.topics.get(&topic).map_or(0, |t| t.relevant)
    }

    /// DCG@k of the best possible ranking for the topic.
    pub fn ideal_dcg(&self, topic: Topic, k: usize) -> f64 {
        self.topics.get(&topic).map_or(0.0, |t| dcg_at_k(&t.ideal, k))
    }
}

/// A run: per topic, documents ordered by score descending, ties by docno ascending.
#[derive(Debug, Default, Clone)]
pub struct Run {
    topics: BTreeMap<Topic, Vec<(String, f64)>>,
}

impl Run {
    /// Parse `topic Q0 docno rank score tag` lines.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut topics: BTreeMap<Topic, Vec<(String, f64)>> = BTreeMap::new();
        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [topic, q0, doc_no, rank, score, tag] = fields.as_slice() else {
                return Err(FormatError::at(line_no, format!("expected 6 fields, found {}", fields.len())));
            };
            let topic = parse_digits(topic).ok_or_else(|| FormatError::at(line_no, format!("invalid topic {topic:?}")))?;
            if *q0 != "Q0" {
                return Err(FormatError::at(line_no, format!("expected Q0, found {q0:?}")));
            }
            if !is_digits(rank) || rank.bytes().all(|b| b == b'0') {
                return Err(FormatError::at(line_no, format!("invalid rank {rank:?}")));
            }
            let score: f64 = score
                .parse()
                .map_err(|_| FormatError::at(line_no, format!("invalid score {score:?}")))?;
            if !is_valid_run_tag(tag) {
                return Err(FormatError::at(line_no, format!("invalid run tag {tag:?}")));
            }
            topics.entry(topic).or_default().push((doc_no.to_string(), score));
        }
        let mut run = Self { topics };
        run.sort();
        Ok(run)
    }

    /// Build a run directly from retrieval output.
    pub fn from_lines(lines: &[RunLine]) -> Self {
        let mut topics: BTreeMap<Topic, Vec<(String, f64)>> = BTreeMap::new();
        for line in lines {
            topics.entry(Topic::from(line.topic)).or_default().push((line.doc_no.clone(), line.score));
        }
        let mut run = Self { topics };
        run.sort();
        run
    }

    fn sort(&mut self) {
        for docs in self.topics.values_mut() {
            docs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        }
    }

    /// Ranked docnos for a topic; empty if the run has no results for it.
    pub fn ranking(&self, topic: Topic) -> impl Iterator<Item = &str> + '_ {
        self.topics
            .get(&topic)
            .into_iter()
            .flat_map(|docs| docs.iter().map(|(d, _)| d.as_str()))
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_digits(s: &str) -> Option<u64> {
    if !is_digits(s) {
        return None;
    }
    s.parse().ok()
}

pub fn average_precision(qrels: &Qrels, run: &Run, topic: Topic) -> f64 {
    let total_relevant = qrels.total_relevant(topic);
    if total_relevant == 0 {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (i, doc_no) in run.ranking(topic).take(AP_DEPTH).enumerate() {
        if qrels.is_relevant(topic, doc_no) {
            hits += 1;
            sum += hits as f64 / (i + 1) as f64;
        }
    }
    sum / total_relevant as f64
}

pub fn precision_at_k(qrels: &Qrels, run: &Run, topic: Topic, k: usize) -> f64 {
    if k == 0 || qrels.total_relevant(topic) == 0 {
        return 0.0;
    }
    let hits = run.ranking(topic).take(k).filter(|d| qrels.is_relevant(topic, d)).count();
    hits as f64 / k as f64
}

/// Σ grade_i / log2(i + 1) over the first `k` grades (i is 1-based).
pub fn dcg_at_k(grades: &[u64], k: usize) -> f64 {
    grades
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, &g)| g as f64 / ((i + 2) as f64).log2())
        .sum()
}

pub fn ndcg_at_k(qrels: &Qrels, run: &Run, topic: Topic, k: usize) -> f64 {
    let ideal = qrels.ideal_dcg(topic, k);
    if ideal == 0.0 {
        return 0.0;
    }
    let grades: Vec<u64> = run.ranking(topic).take(k).map(|d| qrels.grade(topic, d)).collect();
    dcg_at_k(&grades, k) / ideal
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicScores {
    pub topic: Topic,
    pub ap: f64,
    pub p10: f64,
    pub ndcg10: f64,
    pub ndcg1000: f64,
}

impl fmt::Display for TopicScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:.4},{:.4},{:.4},{:.4}", self.topic, self.ap, self.p10, self.ndcg10, self.ndcg1000)
    }
}

/// Score every judged topic, in ascending topic order.
pub fn evaluate(qrels: &Qrels, run: &Run) -> Vec<TopicScores> {
    qrels
        .topics()
        .map(|topic| TopicScores {
            topic,
            ap: average_precision(qrels, run, topic),
            p10: precision_at_k(qrels, run, topic, PRECISION_DEPTH),
            ndcg10: ndcg_at_k(qrels, run, topic, NDCG_SHALLOW),
            ndcg1000: ndcg_at_k(qrels, run, topic, NDCG_DEEP),
        })
        .collect()
}

/// Mean of each metric over the scored topics; `None` when nothing was scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanScores {
    pub map: f64,
    pub p10: f64,
    pub ndcg10: f64,
    pub ndcg1000: f64,
}

pub fn mean_scores(scores: &[TopicScores]) -> Option<MeanScores> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as f64;
    let sum = |f: fn(&TopicScores) -> f64| scores.iter().map(f).sum::<f64>() / n;
    Some(MeanScores {
        map: sum(|s| s.ap),
        p10: sum(|s| s.p10),
        ndcg10: sum(|s| s.ndcg10),
        ndcg1000: sum(|s| s.ndcg1000),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Scored(Vec<TopicScores>),
    BadFormat(FormatError),
}

impl RunOutcome {
    /// Contents of the per-run scores file, header included.
    pub fn render(&self) -> String {
        let mut out = String::from(SCORES_HEADER);
        out.push('\n');
        match self {
            RunOutcome::Scored(scores) => {
                for s in scores {
                    out.push_str(&s.to_string());
                    out.push('\n');
                }
            }
            RunOutcome::BadFormat(_) => {
                out.push_str(BAD_FORMAT_LINE);
                out.push('\n');
            }
        }
        out
    }
}

pub fn evaluate_run_text(qrels: &Qrels, text: &str) -> RunOutcome {
    match Run::parse(text) {
        Ok(run) => RunOutcome::Scored(evaluate(qrels, &run)),
        Err(e) => RunOutcome::BadFormat(e),
    }
}

/// Read and score one run file. Unreadable files count as malformed.
pub fn evaluate_run_file(qrels: &Qrels, path: &Path) -> RunOutcome {
    match std::fs::read_to_string(path) {
        Ok(text) => evaluate_run_text(qrels, &text),
        Err(e) => RunOutcome::BadFormat(FormatError::at(0, format!("cannot read {}: {e}", path.display()))),
    }
}
