//! The fused retrieval pipeline.
//!
//! Lexical, semantic, and entity channels run concurrently against one
//! snapshot; an optional graph-edge list joins when a context note is
//! supplied. A failing channel is skipped and recorded, never fatal.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lx_core::{EntityRecord, LexicalChannel, LxResult, SemanticChannel};
use lx_index::snapshot::{normalize_name, VaultSnapshot};
use lx_store::RelevanceStore;

use crate::config::EngineConfig;
use crate::fusion::{reciprocal_rank_fusion, Channel, RankedList};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub score: f64,
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Channels that failed or were unavailable for this request.
    pub skipped_channels: Vec<Channel>,
}

pub struct SearchPipeline<L, S> {
    lexical: L,
    semantic: S,
    config: EngineConfig,
}

impl<L: LexicalChannel, S: SemanticChannel> SearchPipeline<L, S> {
    pub fn new(lexical: L, semantic: S, config: EngineConfig) -> Self {
        Self {
            lexical,
            semantic,
            config,
        }
    }

    /// Run all channels and fuse their rankings. `context` biases results
    /// toward notes with reinforced edges out of that note.
    pub async fn search(
        &self,
        snapshot: &VaultSnapshot,
        store: Option<&dyn RelevanceStore>,
        query: &str,
        context: Option<&str>,
    ) -> LxResult<SearchResponse> {
        let limit = self.config.search.default_limit;

        let lexical_fut = async { self.lexical.search(query, limit) };
        let semantic_fut = async {
            if !self.semantic.has_index() {
                return Ok(None);
            }
            let vector = self.semantic.embed(query).await?;
            self.semantic.search(&vector, limit).await.map(Some)
        };
        let edges_fut = async {
            match (store, context) {
                (Some(store), Some(path)) => store.edges_for(path, 0.0).await.map(Some),
                _ => Ok(None),
            }
        };
        let (lexical_res, semantic_res, edges_res) =
            tokio::join!(lexical_fut, semantic_fut, edges_fut);

        let mut lists = Vec::new();
        let mut skipped = Vec::new();

        match lexical_res {
            Ok(hits) => lists.push(RankedList::new(
                Channel::Lexical,
                hits.into_iter().map(|h| h.path).collect(),
            )),
            Err(err) => {
                warn!(error = %err, "lexical channel failed, skipping");
                skipped.push(Channel::Lexical);
            }
        }
        match semantic_res {
            Ok(Some(hits)) => lists.push(RankedList::new(
                Channel::Semantic,
                hits.into_iter().map(|h| h.path).collect(),
            )),
            Ok(None) => {
                debug!("no semantic index, skipping channel");
                skipped.push(Channel::Semantic);
            }
            Err(err) => {
                warn!(error = %err, "semantic channel failed, skipping");
                skipped.push(Channel::Semantic);
            }
        }

        let entity_paths: Vec<String> = entity_search(snapshot, query, limit)
            .into_iter()
            .map(|r| r.path)
            .collect();
        if !entity_paths.is_empty() {
            let mut seen = std::collections::HashSet::new();
            let deduped: Vec<String> = entity_paths
                .into_iter()
                .filter(|p| seen.insert(p.clone()))
                .collect();
            lists.push(RankedList::new(Channel::Entity, deduped));
        }

        match edges_res {
            Ok(Some(edges)) => lists.push(RankedList::new(
                Channel::GraphEdge,
                edges.into_iter().map(|e| e.target).take(limit).collect(),
            )),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "edge store unavailable, skipping channel");
                skipped.push(Channel::GraphEdge);
            }
        }

        let fused = reciprocal_rank_fusion(&lists, self.config.search.rrf_k);
        let hits: Vec<SearchHit> = fused
            .into_iter()
            .take(limit)
            .map(|h| {
                let title = snapshot
                    .note(&h.id)
                    .map(|n| n.title.clone())
                    .unwrap_or_default();
                SearchHit {
                    path: h.id,
                    title,
                    score: h.score,
                    channels: h.channels,
                }
            })
            .collect();

        debug!(
            hits = hits.len(),
            channels = lists.len(),
            skipped = skipped.len(),
            "search fused"
        );
        Ok(SearchResponse {
            hits,
            skipped_channels: skipped,
        })
    }
}

/// Entity name channel: exact match first, then prefix, then substring,
/// over names and aliases. Within a tier, better-connected entities rank
/// first.
pub fn entity_search(snapshot: &VaultSnapshot, query: &str, limit: usize) -> Vec<EntityRecord> {
    let q = normalize_name(query);
    if q.is_empty() {
        return Vec::new();
    }

    let mut matched: Vec<(u8, EntityRecord)> = Vec::new();
    for record in snapshot.entity_records() {
        let tier = if record.name == q {
            0
        } else if record.name.starts_with(&q) {
            1
        } else if record.name.contains(&q)
            || record
                .aliases
                .iter()
                .any(|a| normalize_name(a).contains(&q))
        {
            2
        } else {
            continue;
        };
        matched.push((tier, record));
    }

    matched.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| b.1.hub_score.cmp(&a.1.hub_score))
            .then_with(|| a.1.name.cmp(&b.1.name))
    });
    matched.truncate(limit);
    matched.into_iter().map(|(_, record)| record).collect()
}
