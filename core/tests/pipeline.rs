use ircore::bm25::{Bm25Params, Bm25Scorer};
use ircore::boolean::boolean_and;
use ircore::eval::{evaluate_run_file, Qrels, Run, RunOutcome, TopicRange};
use ircore::persist::{load_index, save_index, IndexPaths};
use ircore::run::{to_run_lines, write_run};
use ircore::{IndexBuilder, Tokenizer};
use std::fs;
use tempfile::tempdir;

const CORPUS: &[(&str, &str)] = &[
    ("LA010189-0001", "Rescue crews searched the bay after the ferry capsized."),
    ("LA010189-0002", "City council debates the ferry budget."),
    ("LA010189-0003", "Ferry rescue: divers recover survivors from the ferry."),
    ("LA010189-0004", "Stock markets rallied on Tuesday."),
    ("LA010189-0005", "A new museum opens downtown."),
    ("LA010189-0006", "Dodgers win the pennant in extra innings."),
    ("LA010189-0007", "Storm warnings issued for the coast."),
    ("LA010189-0008", "Freeway traffic slows after a rockslide."),
];

fn build(stem: bool) -> ircore::InvertedIndex {
    let mut b = IndexBuilder::new(Tokenizer::new(stem));
    for (no, text) in CORPUS {
        b.add_document(*no, text);
    }
    b.finish()
}

#[test]
fn build_persist_retrieve_evaluate() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("index"));
    save_index(&paths, &build(false), false).unwrap();
    let (index, meta) = load_index(&paths).unwrap();
    assert_eq!(meta.num_docs, 8);

    let tokenizer = Tokenizer::new(meta.stemmed);
    let query = tokenizer.tokenize("ferry rescue");
    let ranked = Bm25Scorer::new(&index, Bm25Params::default()).rank(&query, 1000);
    let lines = to_run_lines(&index, 401, &ranked, "bm25");
    assert_eq!(lines[0].doc_no, "LA010189-0003");
    assert_eq!(lines.len(), 3);

    let and_lines = to_run_lines(&index, 401, &boolean_and(&index, &query), "booleanAND");
    let and_docs: Vec<&str> = and_lines.iter().map(|l| l.doc_no.as_str()).collect();
    assert_eq!(and_docs, vec!["LA010189-0001", "LA010189-0003"]);

    let run_path = dir.path().join("bm25.txt");
    write_run(&run_path, &lines).unwrap();
    let qrels = Qrels::parse("401 0 LA010189-0003 2\n401 0 LA010189-0001 1\n401 0 LA010189-0002 0\n", TopicRange::default()).unwrap();
    match evaluate_run_file(&qrels, &run_path) {
        RunOutcome::Scored(scores) => {
            assert_eq!(scores.len(), 1);
            assert_eq!(scores[0].ap, 1.0);
            assert!((scores[0].ndcg10 - 1.0).abs() < 1e-12);
        }
        RunOutcome::BadFormat(e) => panic!("unexpected bad format: {e}"),
    }

    let from_memory = Run::from_lines(&lines);
    assert_eq!(from_memory.ranking(401).next(), Some("LA010189-0003"));
}

#[test]
fn stemmed_index_matches_inflected_queries() {
    let index = build(true);
    let query = Tokenizer::new(true).tokenize("rescuing ferries");
    let hits = boolean_and(&index, &query);
    assert_eq!(hits.len(), 2);
}

#[test]
fn bad_run_file_does_not_affect_siblings() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.txt");
    let bad = dir.path().join("bad.txt");
    fs::write(&good, "401 Q0 D1 1 2.5 runA\n401 Q0 D2 2 1.5 runA\n").unwrap();
    fs::write(&bad, "401 Q0 D1 1 2.5 runB\n401 Q0 D2 2 1.5\n").unwrap();
    let qrels = Qrels::parse("401 0 D1 1\n401 0 D2 0\n", TopicRange::default()).unwrap();

    let outcomes: Vec<RunOutcome> = [&bad, &good].iter().map(|p| evaluate_run_file(&qrels, p)).collect();
    assert!(matches!(&outcomes[0], RunOutcome::BadFormat(e) if e.line == 2));
    assert!(matches!(&outcomes[1], RunOutcome::Scored(s) if s.len() == 1 && s[0].ap == 1.0));
}

#[test]
fn unreadable_run_file_is_bad_format() {
    let dir = tempdir().unwrap();
    let qrels = Qrels::parse("401 0 D1 1\n", TopicRange::default()).unwrap();
    let outcome = evaluate_run_file(&qrels, &dir.path().join("missing.txt"));
    assert!(matches!(outcome, RunOutcome::BadFormat(e) if e.line == 0));
}
