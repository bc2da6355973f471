//! Durable relevance state that outlives any snapshot rebuild: reinforced
//! edge weights with read-time decay, suggestion dismissals, entity feedback
//! boosts, and free-form memory facts.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lx_core::LxResult;

pub use sqlite::SqliteRelevanceStore;

/// An edge between two note paths with its decay-adjusted weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEdge {
    pub source: String,
    pub target: String,
    /// Effective weight at read time: stored weight scaled by recency decay.
    pub weight: f64,
    pub updated_at: DateTime<Utc>,
}

/// A free-form fact kept for recall, independent of the vault files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: String,
    pub text: String,
    pub last_mentioned_at: DateTime<Utc>,
}

/// Persistence seam for relevance state. Everything here is upsert-only;
/// rebuilding the vault snapshot never touches this store.
#[async_trait]
pub trait RelevanceStore: Send + Sync {
    /// Reinforce the edge `source -> target`. First call seeds the weight at
    /// 1.0; every later call adds 1.0 and refreshes the decay clock.
    async fn reinforce_edge(&self, source: &str, target: &str) -> LxResult<()>;

    /// Effective (decayed) weight of an edge, `None` when never reinforced.
    async fn edge_weight(&self, source: &str, target: &str) -> LxResult<Option<f64>>;

    /// All edges out of `source` whose effective weight clears `threshold`,
    /// strongest first.
    async fn edges_for(&self, source: &str, threshold: f64) -> LxResult<Vec<StoredEdge>>;

    /// Permanently dismiss a pair. Order does not matter.
    async fn dismiss_pair(&self, a: &str, b: &str) -> LxResult<()>;

    /// Whether the pair was dismissed, in either order.
    async fn is_dismissed(&self, a: &str, b: &str) -> LxResult<bool>;

    /// Accumulate a feedback boost for an entity name.
    async fn record_feedback(&self, entity: &str, boost: f64) -> LxResult<()>;

    /// Current accumulated boost for an entity, 0.0 when none recorded.
    async fn feedback_boost(&self, entity: &str) -> LxResult<f64>;

    /// Accumulate a co-occurrence boost for an entity name. Like feedback,
    /// this is written by outer usage-tracking layers and only read here.
    async fn record_cooccurrence(&self, entity: &str, boost: f64) -> LxResult<()>;

    /// Current accumulated co-occurrence boost, 0.0 when none recorded.
    async fn cooccurrence_boost(&self, entity: &str) -> LxResult<f64>;

    /// Insert or refresh a memory fact.
    async fn upsert_fact(&self, fact: &MemoryFact) -> LxResult<()>;

    /// All facts, most recently mentioned first.
    async fn list_facts(&self) -> LxResult<Vec<MemoryFact>>;
}

/// Canonical order for a dismissal pair so lookups ignore argument order.
pub(crate) fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
