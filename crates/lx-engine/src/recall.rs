//! Recall scoring across entities, notes, and memory facts.
//!
//! One query pass scores every candidate with a decomposed breakdown so
//! each signal stays inspectable. Usage-derived signals (co-occurrence,
//! feedback, edge weights) are read from the durable store, never computed
//! here.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lx_core::{linear_decay, LxResult, ScoreBreakdown, SemanticChannel};
use lx_index::lexical::{stem, tokenize};
use lx_index::snapshot::{normalize_name, VaultSnapshot};
use lx_store::{RelevanceStore, StoredEdge};

use crate::config::RecallConfig;

pub const EXACT_TOKEN_SCORE: f64 = 10.0;
pub const STEMMED_TOKEN_SCORE: f64 = 5.0;
pub const PHRASE_SCORE: f64 = 15.0;
const SEMANTIC_SCALE: f64 = 15.0;
/// How many semantic neighbors to pull per query.
const SEMANTIC_FETCH: usize = 50;
const EDGE_BOOST_SCALE: f64 = 3.0;
const EDGE_BOOST_CAP: f64 = 6.0;
const NOTE_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallKind {
    Entity,
    Note,
    Fact,
}

impl RecallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Note => "note",
            Self::Fact => "fact",
        }
    }
}

impl std::fmt::Display for RecallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallHit {
    pub kind: RecallKind,
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub breakdown: ScoreBreakdown,
}

impl RecallHit {
    pub fn total(&self) -> f64 {
        self.breakdown.total()
    }
}

/// Query-side state shared across all candidates: tokenized terms and,
/// when the query is long enough, semantic neighbor similarities.
pub struct QueryContext {
    tokens: Vec<String>,
    stems: Vec<String>,
    phrase: String,
    semantic: HashMap<String, f64>,
}

impl QueryContext {
    pub async fn build(
        query: &str,
        semantic_channel: Option<&dyn SemanticChannel>,
        config: &RecallConfig,
    ) -> Self {
        let tokens = tokenize(query);
        let stems = tokens.iter().map(|t| stem(t)).collect();
        let phrase = query.trim().to_ascii_lowercase();

        let mut semantic = HashMap::new();
        if let Some(channel) = semantic_channel {
            let long_enough = query.trim().chars().count() >= config.min_semantic_query_chars;
            if channel.has_index() && long_enough {
                match embed_and_search(channel, query).await {
                    Ok(hits) => {
                        semantic = hits;
                    }
                    Err(err) => {
                        warn!(error = %err, "semantic pass failed, scoring without it");
                    }
                }
            }
        }

        Self {
            tokens,
            stems,
            phrase,
            semantic,
        }
    }

    /// +10 per exact query token in the text, +5 per stem-only match, +15
    /// when the whole phrase appears verbatim.
    fn text_relevance(&self, text: &str) -> f64 {
        let text_tokens: HashSet<String> = tokenize(text).into_iter().collect();
        let text_stems: HashSet<String> = text_tokens.iter().map(|t| stem(t)).collect();

        let mut score = 0.0;
        for (token, stemmed) in self.tokens.iter().zip(&self.stems) {
            if text_tokens.contains(token) {
                score += EXACT_TOKEN_SCORE;
            } else if text_stems.contains(stemmed) {
                score += STEMMED_TOKEN_SCORE;
            }
        }
        if !self.phrase.is_empty() && text.to_ascii_lowercase().contains(&self.phrase) {
            score += PHRASE_SCORE;
        }
        score
    }

    fn semantic_boost(&self, path: &str, floor: f64) -> f64 {
        match self.semantic.get(path) {
            Some(&sim) if sim >= floor => sim * SEMANTIC_SCALE,
            _ => 0.0,
        }
    }
}

async fn embed_and_search(
    channel: &dyn SemanticChannel,
    query: &str,
) -> LxResult<HashMap<String, f64>> {
    let vector = channel.embed(query).await?;
    let hits = channel.search(&vector, SEMANTIC_FETCH).await?;
    Ok(hits.into_iter().map(|h| (h.path, h.similarity)).collect())
}

fn recency_boost(last: DateTime<Utc>, max: f64) -> f64 {
    let days = (Utc::now() - last).num_seconds() as f64 / 86_400.0;
    max * linear_decay(days)
}

/// `min((avg - 1) * 3, 6)` above the 1.0 baseline, else nothing. Rewards
/// reinforced connections without letting one hot edge dominate.
fn edge_weight_boost(edges: &[StoredEdge]) -> f64 {
    if edges.is_empty() {
        return 0.0;
    }
    let avg = edges.iter().map(|e| e.weight).sum::<f64>() / edges.len() as f64;
    if avg > 1.0 {
        ((avg - 1.0) * EDGE_BOOST_SCALE).min(EDGE_BOOST_CAP)
    } else {
        0.0
    }
}

/// Score one note against a prepared query context. Also used by the
/// suggestion engine's detailed mode.
pub async fn score_note(
    ctx: &QueryContext,
    snapshot: &VaultSnapshot,
    store: &dyn RelevanceStore,
    config: &RecallConfig,
    path: &str,
) -> LxResult<ScoreBreakdown> {
    let Some(note) = snapshot.note(path) else {
        return Ok(ScoreBreakdown::default());
    };
    let name_key = normalize_name(&note.title);
    let edges = store.edges_for(path, 0.0).await?;
    Ok(ScoreBreakdown {
        text_relevance: ctx.text_relevance(&format!("{} {}", note.title, note.body)),
        recency_boost: recency_boost(note.modified_at, config.recency_max),
        cooccurrence_boost: store.cooccurrence_boost(&name_key).await?,
        feedback_boost: store.feedback_boost(&name_key).await?,
        edge_weight_boost: edge_weight_boost(&edges),
        semantic_boost: ctx.semantic_boost(path, config.semantic_floor),
    })
}

/// One-pass recall over entities, notes, and facts. Hits are deduplicated
/// by (kind, id), sorted by total score, and optionally trimmed to a
/// token budget by dropping the lowest-scored items.
pub async fn recall(
    snapshot: &VaultSnapshot,
    store: &dyn RelevanceStore,
    semantic: Option<&dyn SemanticChannel>,
    config: &RecallConfig,
    query: &str,
    token_budget: Option<usize>,
) -> LxResult<Vec<RecallHit>> {
    let ctx = QueryContext::build(query, semantic, config).await;
    let mut best: HashMap<(RecallKind, String), RecallHit> = HashMap::new();

    let mut paths: Vec<&String> = snapshot.notes.keys().collect();
    paths.sort();
    for path in paths {
        let note = &snapshot.notes[path];
        let breakdown = score_note(&ctx, snapshot, store, config, path).await?;
        if breakdown.text_relevance == 0.0 && breakdown.semantic_boost == 0.0 {
            continue;
        }
        insert_best(
            &mut best,
            RecallHit {
                kind: RecallKind::Note,
                id: path.clone(),
                title: note.title.clone(),
                excerpt: note.body.chars().take(NOTE_EXCERPT_CHARS).collect(),
                breakdown,
            },
        );
    }

    for record in snapshot.entity_records() {
        let mut text = record.name.clone();
        for alias in &record.aliases {
            text.push(' ');
            text.push_str(alias);
        }
        let text_relevance = ctx.text_relevance(&text);
        let semantic_boost = ctx.semantic_boost(&record.path, config.semantic_floor);
        if text_relevance == 0.0 && semantic_boost == 0.0 {
            continue;
        }
        let modified = snapshot
            .note(&record.path)
            .map(|n| n.modified_at)
            .unwrap_or_else(Utc::now);
        let edges = store.edges_for(&record.path, 0.0).await?;
        let breakdown = ScoreBreakdown {
            text_relevance,
            recency_boost: recency_boost(modified, config.recency_max),
            cooccurrence_boost: store.cooccurrence_boost(&record.name).await?,
            feedback_boost: store.feedback_boost(&record.name).await?,
            edge_weight_boost: edge_weight_boost(&edges),
            semantic_boost,
        };
        insert_best(
            &mut best,
            RecallHit {
                kind: RecallKind::Entity,
                id: record.name.clone(),
                title: record.name.clone(),
                excerpt: text,
                breakdown,
            },
        );
    }

    for fact in store.list_facts().await? {
        let text_relevance = ctx.text_relevance(&fact.text);
        if text_relevance == 0.0 {
            continue;
        }
        let breakdown = ScoreBreakdown {
            text_relevance,
            recency_boost: recency_boost(fact.last_mentioned_at, config.recency_max),
            ..Default::default()
        };
        insert_best(
            &mut best,
            RecallHit {
                kind: RecallKind::Fact,
                id: fact.id.clone(),
                title: fact.id,
                excerpt: fact.text,
                breakdown,
            },
        );
    }

    let mut hits: Vec<RecallHit> = best.into_values().collect();
    hits.sort_by(|a, b| {
        b.total()
            .total_cmp(&a.total())
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.id.cmp(&b.id))
    });

    if let Some(budget) = token_budget {
        truncate_to_budget(&mut hits, budget, config.token_estimate_divisor);
    }

    debug!(hits = hits.len(), query_tokens = ctx.tokens.len(), "recall complete");
    Ok(hits)
}

fn insert_best(best: &mut HashMap<(RecallKind, String), RecallHit>, hit: RecallHit) {
    match best.entry((hit.kind, hit.id.clone())) {
        std::collections::hash_map::Entry::Occupied(mut slot) => {
            if hit.total() > slot.get().total() {
                slot.insert(hit);
            }
        }
        std::collections::hash_map::Entry::Vacant(slot) => {
            slot.insert(hit);
        }
    }
}

/// Trim to a token budget by dropping the lowest-scored hits until the
/// cumulative estimate fits. The survivors are always a prefix of the
/// score-descending ranking; a cheap low-scored hit never outlives an
/// expensive higher-scored one.
fn truncate_to_budget(hits: &mut Vec<RecallHit>, budget: usize, divisor: usize) {
    let mut used: usize = hits.iter().map(|h| estimate_tokens(h, divisor)).sum();
    while used > budget {
        match hits.pop() {
            Some(dropped) => used -= estimate_tokens(&dropped, divisor),
            None => break,
        }
    }
}

/// Rough size of a rendered hit, divisor chars per token.
fn estimate_tokens(hit: &RecallHit, divisor: usize) -> usize {
    ((hit.title.len() + hit.excerpt.len()) / divisor.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lx_core::Note;
    use lx_index::semantic::{EmbeddingIndex, HashingEmbedder};
    use lx_store::{MemoryFact, SqliteRelevanceStore};

    fn snapshot() -> VaultSnapshot {
        VaultSnapshot::from_notes(vec![
            Note::new("Rust.md", "Rust")
                .with_body("Systems programming with ownership, borrowing and lifetimes."),
            Note::new("Gardening.md", "Gardening").with_body("Tomatoes and compost rotation."),
            Note::new("Old.md", "Old Plans")
                .with_body("ownership discussions from a while back")
                .with_modified_at(Utc::now() - Duration::days(170)),
        ])
    }

    #[tokio::test]
    async fn exact_stemmed_and_phrase_scoring() {
        let store = SqliteRelevanceStore::open_in_memory().unwrap();
        let snap = snapshot();
        let ctx = QueryContext::build("ownership", None, &RecallConfig::default()).await;
        let b = score_note(&ctx, &snap, &store, &RecallConfig::default(), "Rust.md")
            .await
            .unwrap();
        // exact token (+10) and single-word phrase containment (+15)
        assert!((b.text_relevance - 25.0).abs() < 1e-9);

        let ctx = QueryContext::build("borrowed", None, &RecallConfig::default()).await;
        let b = score_note(&ctx, &snap, &store, &RecallConfig::default(), "Rust.md")
            .await
            .unwrap();
        // "borrowed" only matches "borrowing" through the shared stem
        assert!((b.text_relevance - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn recency_decays_between_fresh_and_stale() {
        let store = SqliteRelevanceStore::open_in_memory().unwrap();
        let snap = snapshot();
        let config = RecallConfig::default();
        let hits = recall(&snap, &store, None, &config, "ownership", None)
            .await
            .unwrap();
        let fresh = hits.iter().find(|h| h.id == "Rust.md").unwrap();
        let stale = hits.iter().find(|h| h.id == "Old.md").unwrap();
        assert!(fresh.breakdown.recency_boost > 9.0);
        assert!(stale.breakdown.recency_boost < 1.5);
        assert!(stale.breakdown.recency_boost >= 1.0); // floor
    }

    #[tokio::test]
    async fn edge_boost_caps_at_six() {
        let store = SqliteRelevanceStore::open_in_memory().unwrap();
        for _ in 0..2 {
            store.reinforce_edge("Rust.md", "Gardening.md").await.unwrap();
        }
        // avg 2.0 -> (2 - 1) * 3 = 3
        let snap = snapshot();
        let ctx = QueryContext::build("ownership", None, &RecallConfig::default()).await;
        let b = score_note(&ctx, &snap, &store, &RecallConfig::default(), "Rust.md")
            .await
            .unwrap();
        assert!((b.edge_weight_boost - 3.0).abs() < 0.05);

        for _ in 0..10 {
            store.reinforce_edge("Rust.md", "Gardening.md").await.unwrap();
        }
        let b = score_note(&ctx, &snap, &store, &RecallConfig::default(), "Rust.md")
            .await
            .unwrap();
        assert!((b.edge_weight_boost - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn feedback_and_cooccurrence_consumed_from_store() {
        let store = SqliteRelevanceStore::open_in_memory().unwrap();
        store.record_feedback("rust", 2.0).await.unwrap();
        store.record_cooccurrence("rust", 1.5).await.unwrap();

        let snap = snapshot();
        let config = RecallConfig::default();
        let hits = recall(&snap, &store, None, &config, "rust", None).await.unwrap();
        let entity = hits
            .iter()
            .find(|h| h.kind == RecallKind::Entity && h.id == "rust")
            .unwrap();
        assert_eq!(entity.breakdown.feedback_boost, 2.0);
        assert_eq!(entity.breakdown.cooccurrence_boost, 1.5);
        assert!((entity.total() - entity.breakdown.total()).abs() < 1e-12);
    }

    #[tokio::test]
    async fn short_query_skips_semantic_pass() {
        let notes = vec![
            Note::new("Rust.md", "Rust").with_body("ownership borrowing lifetimes"),
            Note::new("Gardening.md", "Gardening").with_body("tomatoes compost"),
        ];
        let snap = VaultSnapshot::from_notes(notes.clone());
        let index = EmbeddingIndex::build(HashingEmbedder::default(), &notes)
            .await
            .unwrap();
        let store = SqliteRelevanceStore::open_in_memory().unwrap();
        let config = RecallConfig::default();

        let hits = recall(&snap, &store, Some(&index), &config, "rust", None)
            .await
            .unwrap();
        let note = hits.iter().find(|h| h.id == "Rust.md").unwrap();
        assert_eq!(note.breakdown.semantic_boost, 0.0);

        let hits = recall(
            &snap,
            &store,
            Some(&index),
            &config,
            "ownership borrowing lifetimes",
            None,
        )
        .await
        .unwrap();
        let note = hits.iter().find(|h| h.id == "Rust.md").unwrap();
        assert!(note.breakdown.semantic_boost > 0.0);
    }

    #[tokio::test]
    async fn facts_score_and_budget_drops_lowest() {
        let store = SqliteRelevanceStore::open_in_memory().unwrap();
        store
            .upsert_fact(&MemoryFact {
                id: "coffee".into(),
                text: "prefers single origin coffee".into(),
                last_mentioned_at: Utc::now(),
            })
            .await
            .unwrap();

        let snap = snapshot();
        let config = RecallConfig::default();
        let hits = recall(&snap, &store, None, &config, "coffee", None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, RecallKind::Fact);

        // Tight budget keeps only the best-scored items.
        let all = recall(&snap, &store, None, &config, "ownership", None).await.unwrap();
        assert!(all.len() >= 2);
        let top_cost = estimate_tokens(&all[0], config.token_estimate_divisor);
        let trimmed = recall(&snap, &store, None, &config, "ownership", Some(top_cost))
            .await
            .unwrap();
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].id, all[0].id);
    }

    #[test]
    fn budget_drops_from_the_bottom_never_skips() {
        fn hit(id: &str, score: f64, excerpt_len: usize) -> RecallHit {
            RecallHit {
                kind: RecallKind::Note,
                id: id.into(),
                title: String::new(),
                excerpt: "x".repeat(excerpt_len),
                breakdown: ScoreBreakdown {
                    text_relevance: score,
                    ..Default::default()
                },
            }
        }

        // The top hit alone exceeds the budget: nothing survives, in
        // particular not the cheaper, lower-scored hit behind it.
        let mut hits = vec![hit("big.md", 30.0, 208), hit("small.md", 20.0, 8)];
        truncate_to_budget(&mut hits, 8, 4);
        assert!(hits.is_empty());

        // An expensive mid-list hit is dropped by score order, never
        // skipped over to keep a cheaper item ranked below it.
        let mut hits = vec![
            hit("a.md", 30.0, 12),
            hit("b.md", 20.0, 200),
            hit("c.md", 10.0, 8),
        ];
        truncate_to_budget(&mut hits, 5, 4);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md"]);
    }
}
