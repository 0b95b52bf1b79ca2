use crate::bm25::RankedDoc;
use crate::index::{DocId, InvertedIndex, Posting};

/// Intersect postings lists with a k-way cursor merge.
///
/// Every list must be strictly ascending by doc id. The result is ascending
/// and duplicate free; an empty input yields an empty result.
pub fn intersect(lists: &[&[Posting]]) -> Vec<DocId> {
    let mut out = Vec::new();
    if lists.is_empty() {
        return out;
    }
    let mut cursors = vec![0usize; lists.len()];
    'merge: loop {
        let mut target: DocId = 0;
        for (list, &c) in lists.iter().zip(&cursors) {
            match list.get(c) {
                Some(p) => target = target.max(p.doc_id),
                None => break 'merge,
            }
        }

        let mut aligned = true;
        for (list, c) in lists.iter().zip(cursors.iter_mut()) {
            while *c < list.len() && list[*c].doc_id < target {
                *c += 1;
            }
            match list.get(*c) {
                Some(p) if p.doc_id == target => {}
                Some(_) => aligned = false,
                None => break 'merge,
            }
        }

        if aligned {
            out.push(target);
            for c in cursors.iter_mut() {
                *c += 1;
            }
        }
    }
    out
}

/// Conjunctive retrieval: documents containing every distinct query token.
///
/// Any token missing from the lexicon empties the result. Documents come back
/// in ascending doc id order with rank `1..=m` and score `m - rank`.
pub fn boolean_and(index: &InvertedIndex, tokens: &[String]) -> Vec<RankedDoc> {
    let mut lists: Vec<&[Posting]> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for token in tokens {
        if seen.contains(&token.as_str()) {
            continue;
        }
        seen.push(token);
        match index.postings_for(token) {
            Some(list) => lists.push(list),
            None => return Vec::new(),
        }
    }
    lists.sort_by_key(|l| l.len());

    let docs = intersect(&lists);
    let m = docs.len() as u32;
    docs.into_iter()
        .enumerate()
        .map(|(i, doc_id)| {
            let rank = i as u32 + 1;
            RankedDoc { doc_id, rank, score: (m - rank) as f64 }
        })
        .collect()
}
