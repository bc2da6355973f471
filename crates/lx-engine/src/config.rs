use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub recall: RecallConfig,
}

/// Configuration for fused retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Per-channel and fused result cap.
    pub default_limit: usize,
    /// Reciprocal rank fusion constant. Higher values flatten the gap
    /// between adjacent ranks.
    pub rrf_k: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            rrf_k: 60.0,
        }
    }
}

/// Configuration for graph traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Maximum hops for path searches. Bounds every traversal.
    pub max_depth: usize,
    /// Out-degree scale for the hub penalty curve.
    pub hub_penalty_scale: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            hub_penalty_scale: 10.0,
        }
    }
}

/// Configuration for the wikilink suggestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    /// Minimum backlinks before a dead link becomes a prospect.
    pub min_dead_link_refs: usize,
    /// Minimum recall score a suggestion must reach in detailed mode.
    /// 0.0 keeps everything.
    pub strictness: f64,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            min_dead_link_refs: 2,
            strictness: 0.0,
        }
    }
}

/// Configuration for the recall scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Cosine similarity below this contributes nothing.
    pub semantic_floor: f64,
    /// Queries shorter than this (trimmed chars) skip the embedding pass.
    pub min_semantic_query_chars: usize,
    /// Recency boost for an item touched right now; decays from here.
    pub recency_max: f64,
    /// Rough chars-per-token divisor for budget truncation.
    pub token_estimate_divisor: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            semantic_floor: 0.3,
            min_semantic_query_chars: 12,
            recency_max: 10.0,
            token_estimate_divisor: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.search.rrf_k, 60.0);
        assert_eq!(config.graph.max_depth, 6);
        assert_eq!(config.suggest.min_dead_link_refs, 2);
        assert_eq!(config.recall.semantic_floor, 0.3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"search":{"default_limit":5,"rrf_k":30.0}}"#).unwrap();
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.graph.max_depth, 6);
    }
}
