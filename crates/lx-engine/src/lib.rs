//! The retrieval engine: rank fusion, the search pipeline, entity
//! deduplication, wikilink suggestions, and recall scoring, all reading
//! one vault snapshot plus the durable relevance store.

pub mod config;
pub mod dedup;
pub mod fusion;
pub mod graph;
pub mod pipeline;
pub mod recall;
pub mod wikilink;

pub use config::{EngineConfig, GraphConfig, RecallConfig, SearchConfig, SuggestConfig};
pub use dedup::{match_pair, merge_candidates, MatchReason, MergeCandidate};
pub use fusion::{reciprocal_rank_fusion, Channel, FusedHit, RankedList};
pub use graph::GraphOps;
pub use pipeline::{entity_search, SearchHit, SearchPipeline, SearchResponse};
pub use recall::{recall, QueryContext, RecallHit, RecallKind};
pub use wikilink::{
    suggest, suggest_detailed, DetailedReport, LinkSuggestion, ProspectSource,
    ProspectSuggestion, SuggestionReport,
};
