//! Wikilink suggestions.
//!
//! Scans free text for unlinked mentions of known entities and for
//! prospect entities that have no backing note yet. Matching never touches
//! frontmatter, existing links, code, URLs, headings, footnote
//! definitions, or HTML, and claimed spans never overlap.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use lx_core::{Confidence, LxResult, ScoreBreakdown, SemanticChannel};
use lx_index::snapshot::{normalize_name, VaultSnapshot};
use lx_store::RelevanceStore;

use crate::config::{EngineConfig, SuggestConfig};
use crate::recall::{score_note, QueryContext};

/// Dead links with at least this many backlinks surface as high-confidence
/// prospects.
const HIGH_CONFIDENCE_REFS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Where a prospect was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectSource {
    DeadLink,
    Heuristic,
    Both,
}

impl ProspectSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeadLink => "dead_link",
            Self::Heuristic => "heuristic",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for ProspectSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unlinked mention of an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSuggestion {
    /// The matched text exactly as it appears in the input.
    pub text: String,
    pub path: String,
    pub start: usize,
    pub end: usize,
}

/// A candidate entity with no backing note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectSuggestion {
    pub name: String,
    pub source: ProspectSource,
    pub confidence: Confidence,
    /// Total dead wikilinks pointing at this name across the vault.
    pub wikilink_references: usize,
    /// Distinct notes containing those links.
    pub referencing_notes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionReport {
    pub links: Vec<LinkSuggestion>,
    pub prospects: Vec<ProspectSuggestion>,
}

/// A link suggestion with its recall breakdown, from detailed mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedSuggestion {
    pub link: LinkSuggestion,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedReport {
    pub links: Vec<DetailedSuggestion>,
    pub prospects: Vec<ProspectSuggestion>,
}

// ---------------------------------------------------------------------------
// Exclusion regions
// ---------------------------------------------------------------------------

/// Byte spans of the input where no suggestion may land.
fn exclusion_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();

    // Frontmatter block at the very start of the document.
    if text.starts_with("---\n") || text.starts_with("---\r\n") {
        if let Some(rel) = text[4..].find("\n---") {
            let close = 4 + rel + 1;
            let end = text[close..]
                .find('\n')
                .map(|i| close + i + 1)
                .unwrap_or(text.len());
            spans.push(Span { start: 0, end });
        }
    }

    // Fenced code blocks. An unterminated fence swallows the rest.
    let mut from = 0;
    while let Some(rel) = text[from..].find("```") {
        let open = from + rel;
        match text[open + 3..].find("```") {
            Some(close_rel) => {
                let end = open + 3 + close_rel + 3;
                spans.push(Span { start: open, end });
                from = end;
            }
            None => {
                spans.push(Span {
                    start: open,
                    end: text.len(),
                });
                break;
            }
        }
    }

    // Existing wikilinks.
    scan_delimited(text, "[[", "]]", &mut spans);
    // HTML comments.
    scan_delimited(text, "<!--", "-->", &mut spans);
    // Inline code spans; fence backticks are already covered above so a
    // stray pairing inside a fence is harmless.
    scan_delimited(text, "`", "`", &mut spans);

    // URLs run to the next whitespace.
    for scheme in ["http://", "https://"] {
        let mut from = 0;
        while let Some(rel) = text[from..].find(scheme) {
            let start = from + rel;
            let end = text[start..]
                .find(char::is_whitespace)
                .map(|i| start + i)
                .unwrap_or(text.len());
            spans.push(Span { start, end });
            from = end;
        }
    }

    // Heading lines and footnote definitions.
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') || trimmed.starts_with("[^") {
            spans.push(Span {
                start: offset,
                end: offset + line.len(),
            });
        }
        offset += line.len();
    }

    // HTML tags: '<' followed by a letter or '/'.
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<'
            && i + 1 < bytes.len()
            && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'/')
        {
            let end = text[i..]
                .find('>')
                .map(|rel| i + rel + 1)
                .unwrap_or(text.len());
            spans.push(Span { start: i, end });
            i = end;
        } else {
            i += 1;
        }
    }

    spans.sort_by_key(|s| (s.start, s.end));
    spans
}

fn scan_delimited(text: &str, open: &str, close: &str, spans: &mut Vec<Span>) {
    let mut from = 0;
    while let Some(rel) = text[from..].find(open) {
        let start = from + rel;
        let after = start + open.len();
        match text[after..].find(close) {
            Some(close_rel) => {
                let end = after + close_rel + close.len();
                spans.push(Span { start, end });
                from = end;
            }
            None => break,
        }
    }
}

fn overlaps(spans: &[Span], start: usize, end: usize) -> bool {
    spans.iter().any(|s| start < s.end && s.start < end)
}

/// Alphanumeric characters on either side of the span disqualify a match.
fn word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

// ---------------------------------------------------------------------------
// Existing-entity matching
// ---------------------------------------------------------------------------

/// Case-insensitive scan for entity names, longest name first so a
/// multi-word entity beats its own substrings. Claimed spans are final.
fn match_entities(
    text: &str,
    snapshot: &VaultSnapshot,
    exclusions: &[Span],
    claimed: &mut Vec<Span>,
) -> Vec<LinkSuggestion> {
    let mut names: Vec<(String, String)> = snapshot
        .entity_records()
        .into_iter()
        .map(|r| (r.name, r.path))
        .collect();
    names.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    // Byte-aligned lowercase shadow of the input.
    let lower = text.to_ascii_lowercase();
    let mut links = Vec::new();

    for (name, path) in names {
        if name.len() < 2 {
            continue;
        }
        let mut from = 0;
        while let Some(rel) = lower[from..].find(&name) {
            let start = from + rel;
            let end = start + name.len();
            from = start + 1;
            if !word_bounded(text, start, end) {
                continue;
            }
            if overlaps(exclusions, start, end) || overlaps(claimed, start, end) {
                continue;
            }
            claimed.push(Span { start, end });
            links.push(LinkSuggestion {
                text: text[start..end].to_string(),
                path: path.clone(),
                start,
                end,
            });
        }
    }

    links.sort_by_key(|l| l.start);
    links
}

// ---------------------------------------------------------------------------
// Prospect detection
// ---------------------------------------------------------------------------

fn is_capitalized_word(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            word.chars().count() >= 2 && chars.all(|c| c.is_lowercase())
        }
        _ => false,
    }
}

fn is_camel_case(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(first) if first.is_uppercase())
        && word.chars().skip(1).any(char::is_uppercase)
        && word.chars().any(char::is_lowercase)
        && word.chars().count() >= 4
}

/// Sentence-initial position: start of text, or the previous
/// non-whitespace character ends a sentence. Capitalization there carries
/// no proper-noun signal.
fn at_sentence_start(text: &str, word_start: usize) -> bool {
    match text[..word_start].chars().rev().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | ':'),
    }
}

/// CamelCase words and runs of two or more capitalized words, outside
/// excluded regions.
fn heuristic_spans(text: &str, exclusions: &[Span]) -> Vec<Span> {
    let mut words: Vec<Span> = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, c) in text.char_indices() {
        if c.is_alphanumeric() {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            words.push(Span { start: s, end: idx });
        }
    }
    if let Some(s) = start {
        words.push(Span {
            start: s,
            end: text.len(),
        });
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let word_span = words[i];
        let word = &text[word_span.start..word_span.end];
        if overlaps(exclusions, word_span.start, word_span.end) {
            i += 1;
            continue;
        }
        if is_camel_case(word) {
            out.push(word_span);
            i += 1;
            continue;
        }
        if is_capitalized_word(word) && !at_sentence_start(text, word_span.start) {
            let mut j = i;
            while j + 1 < words.len() {
                let next = words[j + 1];
                let gap = &text[words[j].end..next.start];
                let next_word = &text[next.start..next.end];
                if gap == " "
                    && is_capitalized_word(next_word)
                    && !overlaps(exclusions, next.start, next.end)
                {
                    j += 1;
                } else {
                    break;
                }
            }
            if j > i {
                out.push(Span {
                    start: word_span.start,
                    end: words[j].end,
                });
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

fn find_prospects(
    text: &str,
    snapshot: &VaultSnapshot,
    exclusions: &[Span],
    config: &SuggestConfig,
) -> Vec<ProspectSuggestion> {
    // Keyed by normalized name so dead-link and heuristic detections of the
    // same text merge into one prospect.
    let mut prospects: BTreeMap<String, ProspectSuggestion> = BTreeMap::new();

    let lower = text.to_ascii_lowercase();
    for (target, backlinks) in snapshot.dead_link_targets() {
        if backlinks.len() < config.min_dead_link_refs {
            continue;
        }
        // Must appear as plain text in this input.
        let mut found = None;
        let mut from = 0;
        while let Some(rel) = lower[from..].find(target) {
            let start = from + rel;
            let end = start + target.len();
            from = start + 1;
            if word_bounded(text, start, end) && !overlaps(exclusions, start, end) {
                found = Some(Span { start, end });
                break;
            }
        }
        let Some(span) = found else {
            continue;
        };
        let sources: HashSet<&str> = backlinks.iter().map(|b| b.source.as_str()).collect();
        let confidence = if backlinks.len() >= HIGH_CONFIDENCE_REFS {
            Confidence::High
        } else {
            Confidence::Medium
        };
        prospects.insert(
            target.to_string(),
            ProspectSuggestion {
                name: text[span.start..span.end].to_string(),
                source: ProspectSource::DeadLink,
                confidence,
                wikilink_references: backlinks.len(),
                referencing_notes: sources.len(),
            },
        );
    }

    for span in heuristic_spans(text, exclusions) {
        let candidate = &text[span.start..span.end];
        if snapshot.resolve(candidate).is_some() {
            continue;
        }
        let key = normalize_name(candidate);
        if key.len() < 3 {
            continue;
        }
        match prospects.get_mut(&key) {
            Some(existing) => {
                // Two independent signals agree; promote.
                existing.source = ProspectSource::Both;
                existing.confidence = Confidence::High;
            }
            None => {
                prospects.insert(
                    key,
                    ProspectSuggestion {
                        name: candidate.to_string(),
                        source: ProspectSource::Heuristic,
                        confidence: Confidence::Low,
                        wikilink_references: 0,
                        referencing_notes: 0,
                    },
                );
            }
        }
    }

    let mut out: Vec<ProspectSuggestion> = prospects.into_values().collect();
    out.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Scan `text` for unlinked entity mentions and prospect entities.
/// Deterministic for identical input, so repeated runs agree exactly.
pub fn suggest(text: &str, snapshot: &VaultSnapshot, config: &SuggestConfig) -> SuggestionReport {
    let exclusions = exclusion_spans(text);
    let mut claimed = Vec::new();
    let links = match_entities(text, snapshot, &exclusions, &mut claimed);
    let prospects = find_prospects(text, snapshot, &exclusions, config);
    debug!(
        links = links.len(),
        prospects = prospects.len(),
        "suggestion scan complete"
    );
    SuggestionReport { links, prospects }
}

/// Like [`suggest`], but scores each link suggestion with the full recall
/// breakdown and drops those below the configured strictness.
pub async fn suggest_detailed(
    text: &str,
    snapshot: &VaultSnapshot,
    store: &dyn RelevanceStore,
    semantic: Option<&dyn SemanticChannel>,
    config: &EngineConfig,
) -> LxResult<DetailedReport> {
    let report = suggest(text, snapshot, &config.suggest);
    let mut links = Vec::new();
    for link in report.links {
        let ctx = QueryContext::build(&link.text, semantic, &config.recall).await;
        let breakdown = score_note(&ctx, snapshot, store, &config.recall, &link.path).await?;
        if breakdown.total() >= config.suggest.strictness {
            links.push(DetailedSuggestion { link, breakdown });
        }
    }
    Ok(DetailedReport {
        links,
        prospects: report.prospects,
    })
}
