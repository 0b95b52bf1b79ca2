use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

lazy_static! {
    static ref TOPIC_RE: Regex =
        Regex::new(r"<number>(\d+)</number>\s*<title>([^<]+)</title>").expect("valid regex");
}

/// Topic id -> query text, iterated in ascending topic order.
pub type Queries = BTreeMap<u32, String>;

/// Load queries from a JSON object such as `{"401": "foreign minorities germany"}`.
pub fn load_queries(path: &Path) -> Result<Queries> {
    let f = File::open(path).with_context(|| format!("opening queries {}", path.display()))?;
    let queries = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing queries {}", path.display()))?;
    Ok(queries)
}

/// Pull `<number>`/`<title>` pairs out of a topics file, skipping excluded topics.
pub fn extract_topics(text: &str, exclude: &HashSet<u32>) -> Queries {
    let mut queries = Queries::new();
    for caps in TOPIC_RE.captures_iter(text) {
        let Ok(topic) = caps[1].parse::<u32>() else { continue };
        if exclude.contains(&topic) {
            continue;
        }
        queries.insert(topic, caps[2].trim().to_string());
    }
    queries
}
