//! Graph operations bound to engine tuning.
//!
//! Thin façade over the link graph so callers get the configured depth
//! bound and hub penalty without threading constants everywhere.

use std::collections::HashSet;

use lx_graph::{
    connection_strength, BidirectionalPair, CommonNeighbor, ConnectionStrength, LinkGraph,
    PathResult, WeightedPathResult,
};
use lx_index::snapshot::VaultSnapshot;

use crate::config::GraphConfig;

pub struct GraphOps<'a> {
    snapshot: &'a VaultSnapshot,
    graph: LinkGraph,
    config: GraphConfig,
}

impl<'a> GraphOps<'a> {
    pub fn new(snapshot: &'a VaultSnapshot, config: GraphConfig) -> Self {
        let graph =
            LinkGraph::from_snapshot(snapshot).with_hub_penalty_scale(config.hub_penalty_scale);
        Self {
            snapshot,
            graph,
            config,
        }
    }

    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    pub fn shortest_path(&self, from: &str, to: &str) -> PathResult {
        self.graph.shortest_path(from, to, self.config.max_depth)
    }

    pub fn weighted_shortest_path(&self, from: &str, to: &str) -> WeightedPathResult {
        self.graph
            .weighted_shortest_path(from, to, self.config.max_depth)
    }

    pub fn common_neighbors(&self, a: &str, b: &str) -> Vec<CommonNeighbor> {
        self.graph.common_neighbors(a, b)
    }

    pub fn bidirectional_links(&self, scope: Option<&HashSet<String>>) -> Vec<BidirectionalPair> {
        self.graph.bidirectional_links(scope)
    }

    pub fn connection(&self, a: &str, b: &str) -> Option<ConnectionStrength> {
        connection_strength(self.snapshot, &self.graph, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lx_core::{Note, Outlink};

    fn snapshot() -> VaultSnapshot {
        VaultSnapshot::from_notes(vec![
            Note::new("A.md", "A").with_outlinks(vec![Outlink::new("B", 1)]),
            Note::new("B.md", "B").with_outlinks(vec![Outlink::new("C", 1)]),
            Note::new("C.md", "C").with_outlinks(vec![Outlink::new("D", 1)]),
            Note::new("D.md", "D"),
        ])
    }

    #[test]
    fn depth_bound_comes_from_config() {
        let snap = snapshot();
        let ops = GraphOps::new(
            &snap,
            GraphConfig {
                max_depth: 2,
                ..GraphConfig::default()
            },
        );
        assert!(!ops.shortest_path("A.md", "D.md").exists);
        assert!(ops.shortest_path("A.md", "C.md").exists);

        let deep = GraphOps::new(&snap, GraphConfig::default());
        let path = deep.shortest_path("A.md", "D.md");
        assert!(path.exists);
        assert_eq!(path.length, 3);
    }

    #[test]
    fn connection_passes_through() {
        let snap = snapshot();
        let ops = GraphOps::new(&snap, GraphConfig::default());
        let strength = ops.connection("A.md", "B.md").unwrap();
        assert_eq!(strength.link_score, 1.0);
    }
}
