//! In-memory inverted index with BM25 ranking.
//!
//! Tokens are lowercased and lightly stemmed at both index and query time.
//! A verbatim phrase match adds a flat bonus on top of the BM25 score so
//! exact mentions outrank bag-of-words matches.

use std::collections::HashMap;

use lx_core::{LexicalChannel, LexicalHit, LxResult, Note};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;
/// Flat score bonus when the whole query phrase appears verbatim.
const PHRASE_BONUS: f64 = 1.5;
const SNIPPET_RADIUS: usize = 60;

/// Lowercase alphanumeric tokens of a text, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Light suffix stemmer: enough to fold plurals and common verb forms
/// without a dictionary. Never shrinks a token below three characters.
pub fn stem(token: &str) -> String {
    let t = token;
    for suffix in ["ing", "ed", "ies", "es", "ly", "s"] {
        if let Some(base) = t.strip_suffix(suffix) {
            if base.len() >= 3 {
                if suffix == "ies" {
                    return format!("{base}y");
                }
                return base.to_string();
            }
        }
    }
    t.to_string()
}

#[derive(Debug)]
struct DocEntry {
    title: String,
    text_lower: String,
    token_count: usize,
}

/// BM25 inverted index over note titles and bodies.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    docs: HashMap<String, DocEntry>,
    postings: HashMap<String, HashMap<String, u32>>,
    total_tokens: usize,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_notes<'a, I>(notes: I) -> Self
    where
        I: IntoIterator<Item = &'a Note>,
    {
        let mut index = Self::new();
        for note in notes {
            index.index_note(note);
        }
        index
    }

    /// Index a note, replacing any prior version of the same path so
    /// stale postings never linger after a re-index.
    pub fn index_note(&mut self, note: &Note) {
        self.remove_note(&note.path);
        let text = format!("{} {}", note.title, note.body);
        let tokens: Vec<String> = tokenize(&text).iter().map(|t| stem(t)).collect();
        self.total_tokens += tokens.len();

        let mut freqs: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *freqs.entry(token.clone()).or_default() += 1;
        }
        for (token, tf) in freqs {
            self.postings
                .entry(token)
                .or_default()
                .insert(note.path.clone(), tf);
        }

        self.docs.insert(
            note.path.clone(),
            DocEntry {
                title: note.title.clone(),
                text_lower: text.to_lowercase(),
                token_count: tokens.len(),
            },
        );
    }

    /// Drop a note's postings; a no-op for unknown paths.
    pub fn remove_note(&mut self, path: &str) {
        let Some(old) = self.docs.remove(path) else {
            return;
        };
        self.total_tokens -= old.token_count;
        self.postings.retain(|_, docs| {
            docs.remove(path);
            !docs.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn avg_doc_len(&self) -> f64 {
        if self.docs.is_empty() {
            return 0.0;
        }
        self.total_tokens as f64 / self.docs.len() as f64
    }

    fn snippet(entry: &DocEntry, terms: &[String]) -> String {
        let text = &entry.text_lower;
        let pos = terms.iter().filter_map(|t| text.find(t.as_str())).min();
        let Some(pos) = pos else {
            return entry.text_lower.chars().take(SNIPPET_RADIUS * 2).collect();
        };
        let start = text[..pos]
            .char_indices()
            .rev()
            .take(SNIPPET_RADIUS)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(pos);
        let end = text[pos..]
            .char_indices()
            .take(SNIPPET_RADIUS)
            .last()
            .map(|(i, c)| pos + i + c.len_utf8())
            .unwrap_or(text.len());
        text[start..end].trim().to_string()
    }
}

impl LexicalChannel for InvertedIndex {
    fn search(&self, query: &str, limit: usize) -> LxResult<Vec<LexicalHit>> {
        let raw_terms = tokenize(query);
        if raw_terms.is_empty() || self.docs.is_empty() {
            return Ok(Vec::new());
        }
        let terms: Vec<String> = raw_terms.iter().map(|t| stem(t)).collect();

        let n = self.docs.len() as f64;
        let avg_len = self.avg_doc_len();
        let phrase = query.trim().to_lowercase();

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for (path, &tf) in postings {
                let entry = &self.docs[path];
                let tf = tf as f64;
                let norm = tf * (BM25_K1 + 1.0)
                    / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * entry.token_count as f64 / avg_len));
                *scores.entry(path.as_str()).or_default() += idf * norm;
            }
        }

        let mut hits: Vec<LexicalHit> = scores
            .into_iter()
            .map(|(path, mut score)| {
                let entry = &self.docs[path];
                if !phrase.is_empty() && entry.text_lower.contains(&phrase) {
                    score += PHRASE_BONUS;
                }
                LexicalHit {
                    path: path.to_string(),
                    title: entry.title.clone(),
                    snippet: Self::snippet(entry, &terms),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(path: &str, title: &str, body: &str) -> Note {
        Note::new(path, title).with_body(body)
    }

    fn index() -> InvertedIndex {
        InvertedIndex::from_notes(&[
            note(
                "rust.md",
                "Rust Notes",
                "Rust ownership and borrowing. The borrow checker enforces lifetimes.",
            ),
            note(
                "python.md",
                "Python Notes",
                "Python uses reference counting. Generators and iterators everywhere.",
            ),
            note(
                "mixed.md",
                "Polyglot",
                "Comparing rust and python for systems scripting.",
            ),
        ])
    }

    #[test]
    fn single_term_ranks_focused_doc_first() {
        let idx = index();
        let hits = idx.search("borrowing", 10).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].path, "rust.md");
    }

    #[test]
    fn stemmed_match_finds_base_form() {
        let idx = index();
        // "generator" should match "Generators" through stemming.
        let hits = idx.search("generator", 10).unwrap();
        assert_eq!(hits[0].path, "python.md");
    }

    #[test]
    fn phrase_bonus_beats_scattered_tokens() {
        let idx = InvertedIndex::from_notes(&[
            note("a.md", "A", "the quick brown fox jumps"),
            note("b.md", "B", "quick. brown. a fox somewhere. quick brown again"),
        ]);
        let hits = idx.search("quick brown fox", 10).unwrap();
        assert_eq!(hits[0].path, "a.md");
    }

    #[test]
    fn empty_query_and_unknown_terms() {
        let idx = index();
        assert!(idx.search("", 10).unwrap().is_empty());
        assert!(idx.search("zzzzzz", 10).unwrap().is_empty());
    }

    #[test]
    fn snippet_covers_match() {
        let idx = index();
        let hits = idx.search("lifetimes", 10).unwrap();
        assert!(hits[0].snippet.contains("lifetime"));
    }

    #[test]
    fn reindexing_a_path_replaces_old_postings() {
        let mut idx = InvertedIndex::new();
        idx.index_note(&note("a.md", "A", "ancient keyword"));
        idx.index_note(&note("a.md", "A", "fresh content"));
        assert_eq!(idx.len(), 1);
        assert!(idx.search("ancient", 10).unwrap().is_empty());
        assert_eq!(idx.search("fresh", 10).unwrap()[0].path, "a.md");
    }

    #[test]
    fn limit_respected_and_order_deterministic() {
        let idx = index();
        let hits = idx.search("rust python", 1).unwrap();
        assert_eq!(hits.len(), 1);
        let again = idx.search("rust python", 1).unwrap();
        assert_eq!(hits[0].path, again[0].path);
    }
}
