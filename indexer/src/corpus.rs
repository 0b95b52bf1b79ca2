use anyhow::{anyhow, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// A document as handed to the index builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDoc {
    pub doc_no: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    title: String,
    body: String,
}

impl From<InputDoc> for CorpusDoc {
    fn from(doc: InputDoc) -> Self {
        let text = if doc.title.is_empty() { doc.body } else { format!("{}\n{}", doc.title, doc.body) };
        CorpusDoc { doc_no: doc.id, text }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    TrecGz,
    Trec,
    Json,
    JsonLines,
}

impl CorpusFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str())? {
            "gz" => Some(Self::TrecGz),
            "sgml" | "trec" => Some(Self::Trec),
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Open a corpus file and stream its documents in file order.
pub fn open(path: &Path, format: CorpusFormat) -> Result<Box<dyn Iterator<Item = Result<CorpusDoc>>>> {
    let f = File::open(path)?;
    Ok(match format {
        CorpusFormat::TrecGz => Box::new(TrecReader::new(BufReader::new(GzDecoder::new(f)))),
        CorpusFormat::Trec => Box::new(TrecReader::new(BufReader::new(f))),
        CorpusFormat::JsonLines => Box::new(BufReader::new(f).lines().filter_map(parse_json_line)),
        CorpusFormat::Json => {
            let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))?;
            let docs: Vec<InputDoc> = match json {
                serde_json::Value::Array(arr) => arr
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<_, _>>()?,
                obj @ serde_json::Value::Object(_) => vec![serde_json::from_value(obj)?],
                _ => Vec::new(),
            };
            Box::new(docs.into_iter().map(|d| Ok::<_, anyhow::Error>(CorpusDoc::from(d))))
        }
    })
}

fn parse_json_line(line: std::io::Result<String>) -> Option<Result<CorpusDoc>> {
    let line = match line {
        Ok(l) => l,
        Err(e) => return Some(Err(e.into())),
    };
    if line.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str::<InputDoc>(&line).map(CorpusDoc::from).map_err(Into::into))
}

#[derive(Default)]
struct Sections {
    headline: bool,
    text: bool,
    graphic: bool,
}

/// Reader for SGML-tagged `<DOC>` streams such as the LA Times collection.
///
/// The docno comes from `<DOCNO>`. Indexable text is every tag-free line
/// inside `<HEADLINE>`, `<TEXT>` or `<GRAPHIC>`.
pub struct TrecReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> TrecReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0 }
    }
}

impl<R: BufRead> Iterator for TrecReader<R> {
    type Item = Result<CorpusDoc>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut in_doc = false;
        let mut doc_no: Option<String> = None;
        let mut text = String::new();
        let mut open = Sections::default();

        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => return Some(Err(e.into())),
            };
            if line.contains("<DOC>") {
                in_doc = true;
            }
            if !in_doc {
                continue;
            }
            if line.contains("<DOCNO>") {
                doc_no = Some(line.replace("<DOCNO>", "").replace("</DOCNO>", "").trim().to_string());
            }
            toggle(&line, "HEADLINE", &mut open.headline);
            toggle(&line, "TEXT", &mut open.text);
            toggle(&line, "GRAPHIC", &mut open.graphic);

            if (open.headline || open.text || open.graphic) && !line.contains('<') && !line.contains('>') {
                text.push_str(&line);
                text.push('\n');
            }

            if line.contains("</DOC>") {
                return Some(match doc_no {
                    Some(doc_no) if !doc_no.is_empty() => Ok(CorpusDoc { doc_no, text }),
                    _ => Err(anyhow!("document ending on line {} has no <DOCNO>", self.line_no)),
                });
            }
        }
        if in_doc {
            return Some(Err(anyhow!("unterminated <DOC> at end of input")));
        }
        None
    }
}

fn toggle(line: &str, tag: &str, flag: &mut bool) {
    if line.contains(&format!("<{tag}>")) {
        *flag = true;
    }
    if line.contains(&format!("</{tag}>")) {
        *flag = false;
    }
}
