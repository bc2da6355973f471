//! In-memory link graph for fast traversal over one vault snapshot.
//!
//! Nodes are note paths; edges are resolved wikilinks carrying the line
//! they were declared on. Adjacency is rebuilt from the snapshot on every
//! index rebuild; cycles (including self-links) are handled by explicit
//! visited sets, never by pointer structure.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use lx_index::snapshot::VaultSnapshot;

/// Result of an unweighted path search. `length` is the edge count, `-1`
/// when no path exists within the depth bound or an endpoint is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub exists: bool,
    pub path: Vec<String>,
    pub length: i32,
}

impl PathResult {
    fn not_found() -> Self {
        Self {
            exists: false,
            path: Vec::new(),
            length: -1,
        }
    }
}

/// Result of a hub-penalized path search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPathResult {
    pub exists: bool,
    pub path: Vec<String>,
    pub length: i32,
    pub cost: f64,
}

impl WeightedPathResult {
    fn not_found() -> Self {
        Self {
            exists: false,
            path: Vec::new(),
            length: -1,
            cost: 0.0,
        }
    }
}

/// A target two notes both link to, with the declaring line on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonNeighbor {
    pub target: String,
    pub line_a: usize,
    pub line_b: usize,
}

/// A mutually linked pair, `a < b` lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidirectionalPair {
    pub a: String,
    pub b: String,
}

/// Default divisor for the hub penalty curve.
pub const HUB_PENALTY_SCALE: f64 = 10.0;

/// Extra cost for routing through a node with the given out-degree.
/// `ln(1 + d/scale)`: zero for leaves, monotonically increasing, so paths
/// through generic index notes lose to topically specific routes.
pub fn hub_penalty(out_degree: usize, scale: f64) -> f64 {
    (1.0 + out_degree as f64 / scale).ln()
}

pub struct LinkGraph {
    graph: DiGraph<String, usize>,
    node_map: HashMap<String, NodeIndex>,
    hub_penalty_scale: f64,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            hub_penalty_scale: HUB_PENALTY_SCALE,
        }
    }

    /// Build from a snapshot: every note becomes a node, every resolved
    /// outlink an edge, in declaration order.
    pub fn from_snapshot(snapshot: &VaultSnapshot) -> Self {
        let mut lg = Self::new();
        let mut paths: Vec<&String> = snapshot.notes.keys().collect();
        paths.sort();
        for path in &paths {
            lg.ensure_node(path);
        }
        for path in paths {
            for (target, line) in snapshot.resolved_outlinks(path) {
                lg.add_edge(path, &target, line);
            }
        }
        lg
    }

    pub fn with_hub_penalty_scale(mut self, scale: f64) -> Self {
        self.hub_penalty_scale = scale;
        self
    }

    fn ensure_node(&mut self, path: &str) -> NodeIndex {
        match self.node_map.get(path) {
            Some(idx) => *idx,
            None => {
                let idx = self.graph.add_node(path.to_string());
                self.node_map.insert(path.to_string(), idx);
                idx
            }
        }
    }

    pub fn add_edge(&mut self, from: &str, to: &str, line: usize) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        self.graph.add_edge(from_idx, to_idx, line);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.node_map.contains_key(path)
    }

    pub fn out_degree(&self, path: &str) -> usize {
        match self.node_map.get(path) {
            Some(idx) => self.graph.edges(*idx).count(),
            None => 0,
        }
    }

    /// Outgoing neighbors with the declaring line, in link-declaration
    /// order. petgraph iterates edges newest-first, hence the reverse.
    fn out_links(&self, idx: NodeIndex) -> Vec<(NodeIndex, usize)> {
        let mut out: Vec<(NodeIndex, usize)> = self
            .graph
            .edges(idx)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        out.reverse();
        out
    }

    fn path_to(&self, prev: &HashMap<NodeIndex, NodeIndex>, end: NodeIndex) -> Vec<String> {
        let mut chain = vec![end];
        let mut cursor = end;
        while let Some(&p) = prev.get(&cursor) {
            chain.push(p);
            cursor = p;
        }
        chain.reverse();
        chain.into_iter().map(|i| self.graph[i].clone()).collect()
    }

    /// Unweighted BFS shortest path bounded by `max_depth` edges. Each
    /// reachable note is visited at most once; neighbor expansion follows
    /// link-declaration order so results are deterministic.
    pub fn shortest_path(&self, from: &str, to: &str, max_depth: usize) -> PathResult {
        let (Some(&start), Some(&goal)) = (self.node_map.get(from), self.node_map.get(to)) else {
            return PathResult::not_found();
        };
        if start == goal {
            return PathResult {
                exists: true,
                path: vec![from.to_string()],
                length: 0,
            };
        }

        let mut visited = HashSet::new();
        visited.insert(start);
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back((start, 0usize));

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (neighbor, _line) in self.out_links(node) {
                if !visited.insert(neighbor) {
                    continue;
                }
                prev.insert(neighbor, node);
                if neighbor == goal {
                    let path = self.path_to(&prev, goal);
                    return PathResult {
                        exists: true,
                        length: (path.len() - 1) as i32,
                        path,
                    };
                }
                queue.push_back((neighbor, depth + 1));
            }
        }

        PathResult::not_found()
    }

    /// Dijkstra variant where entering a node costs
    /// `1 + hub_penalty(out_degree)`, so high-fanout index notes are
    /// deprioritized. Bounded by `max_depth` hops.
    pub fn weighted_shortest_path(
        &self,
        from: &str,
        to: &str,
        max_depth: usize,
    ) -> WeightedPathResult {
        #[derive(Debug)]
        struct State {
            cost: f64,
            hops: usize,
            node: NodeIndex,
        }
        impl PartialEq for State {
            fn eq(&self, other: &Self) -> bool {
                self.cost == other.cost && self.node == other.node
            }
        }
        impl Eq for State {}
        impl Ord for State {
            fn cmp(&self, other: &Self) -> Ordering {
                // Min-heap on cost; ties to fewer hops for determinism.
                other
                    .cost
                    .total_cmp(&self.cost)
                    .then_with(|| other.hops.cmp(&self.hops))
            }
        }
        impl PartialOrd for State {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let (Some(&start), Some(&goal)) = (self.node_map.get(from), self.node_map.get(to)) else {
            return WeightedPathResult::not_found();
        };
        if start == goal {
            return WeightedPathResult {
                exists: true,
                path: vec![from.to_string()],
                length: 0,
                cost: 0.0,
            };
        }

        let mut best: HashMap<NodeIndex, f64> = HashMap::new();
        best.insert(start, 0.0);
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut heap = BinaryHeap::new();
        heap.push(State {
            cost: 0.0,
            hops: 0,
            node: start,
        });

        while let Some(State { cost, hops, node }) = heap.pop() {
            if node == goal {
                let path = self.path_to(&prev, goal);
                return WeightedPathResult {
                    exists: true,
                    length: (path.len() - 1) as i32,
                    path,
                    cost,
                };
            }
            if cost > *best.get(&node).unwrap_or(&f64::INFINITY) || hops >= max_depth {
                continue;
            }
            for (neighbor, _line) in self.out_links(node) {
                let degree = self.graph.edges(neighbor).count();
                let next_cost = cost + 1.0 + hub_penalty(degree, self.hub_penalty_scale);
                if next_cost < *best.get(&neighbor).unwrap_or(&f64::INFINITY) {
                    best.insert(neighbor, next_cost);
                    prev.insert(neighbor, node);
                    heap.push(State {
                        cost: next_cost,
                        hops: hops + 1,
                        node: neighbor,
                    });
                }
            }
        }

        WeightedPathResult::not_found()
    }

    /// Outlink targets both notes share, with the first declaring line
    /// from each side. Sorted by target path.
    pub fn common_neighbors(&self, a: &str, b: &str) -> Vec<CommonNeighbor> {
        let (Some(&ia), Some(&ib)) = (self.node_map.get(a), self.node_map.get(b)) else {
            return Vec::new();
        };

        let mut from_a: HashMap<NodeIndex, usize> = HashMap::new();
        for (target, line) in self.out_links(ia) {
            from_a.entry(target).or_insert(line);
        }

        let mut shared: HashMap<NodeIndex, (usize, usize)> = HashMap::new();
        for (target, line_b) in self.out_links(ib) {
            if let Some(&line_a) = from_a.get(&target) {
                shared.entry(target).or_insert((line_a, line_b));
            }
        }

        let mut out: Vec<CommonNeighbor> = shared
            .into_iter()
            .map(|(idx, (line_a, line_b))| CommonNeighbor {
                target: self.graph[idx].clone(),
                line_a,
                line_b,
            })
            .collect();
        out.sort_by(|x, y| x.target.cmp(&y.target));
        out
    }

    /// Pairs where A links B and B links A, deduplicated by the
    /// order-independent pair key. `scope` restricts both endpoints.
    pub fn bidirectional_links(&self, scope: Option<&HashSet<String>>) -> Vec<BidirectionalPair> {
        let mut seen: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
        let mut pairs = Vec::new();

        for edge in self.graph.edge_indices() {
            let Some((from, to)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if from == to {
                continue;
            }
            let key = if from < to { (from, to) } else { (to, from) };
            if seen.contains(&key) {
                continue;
            }
            if !self.graph.contains_edge(to, from) {
                continue;
            }
            if let Some(scope) = scope {
                if !scope.contains(&self.graph[from]) || !scope.contains(&self.graph[to]) {
                    continue;
                }
            }
            seen.insert(key);
            let (mut a, mut b) = (self.graph[from].clone(), self.graph[to].clone());
            if a > b {
                std::mem::swap(&mut a, &mut b);
            }
            pairs.push(BidirectionalPair { a, b });
        }

        pairs.sort_by(|x, y| x.a.cmp(&y.a).then_with(|| x.b.cmp(&y.b)));
        pairs
    }
}

impl Default for LinkGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> LinkGraph {
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "B.md", 1);
        g.add_edge("B.md", "C.md", 1);
        g
    }

    #[test]
    fn bfs_transitive_path() {
        let g = chain();
        let result = g.shortest_path("A.md", "C.md", 5);
        assert_eq!(
            result,
            PathResult {
                exists: true,
                path: vec!["A.md".into(), "B.md".into(), "C.md".into()],
                length: 2,
            }
        );
    }

    #[test]
    fn bfs_respects_direction_and_depth() {
        let g = chain();
        assert!(!g.shortest_path("C.md", "A.md", 5).exists);
        let bounded = g.shortest_path("A.md", "C.md", 1);
        assert!(!bounded.exists);
        assert_eq!(bounded.length, -1);
    }

    #[test]
    fn unknown_endpoint_is_not_found_not_panic() {
        let g = chain();
        let result = g.shortest_path("A.md", "Nope.md", 5);
        assert!(!result.exists);
        assert_eq!(result.length, -1);
        assert!(result.path.is_empty());
    }

    #[test]
    fn self_path_is_zero_length() {
        let g = chain();
        let result = g.shortest_path("A.md", "A.md", 5);
        assert!(result.exists);
        assert_eq!(result.length, 0);
        assert_eq!(result.path, vec!["A.md".to_string()]);
    }

    #[test]
    fn cycles_terminate() {
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "B.md", 1);
        g.add_edge("B.md", "A.md", 1);
        g.add_edge("A.md", "A.md", 2);
        let result = g.shortest_path("A.md", "B.md", 10);
        assert_eq!(result.length, 1);
    }

    #[test]
    fn bfs_prefers_declaration_order() {
        // Two equal-length routes to D; the first-declared link wins.
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "B.md", 1);
        g.add_edge("A.md", "C.md", 2);
        g.add_edge("B.md", "D.md", 1);
        g.add_edge("C.md", "D.md", 1);
        let result = g.shortest_path("A.md", "D.md", 5);
        assert_eq!(result.path, vec!["A.md", "B.md", "D.md"]);
    }

    #[test]
    fn hub_penalty_monotonic() {
        let mut prev = hub_penalty(0, HUB_PENALTY_SCALE);
        assert_eq!(prev, 0.0);
        for d in 1..200 {
            let cur = hub_penalty(d, HUB_PENALTY_SCALE);
            assert!(cur > prev, "penalty not increasing at degree {d}");
            prev = cur;
        }
    }

    #[test]
    fn weighted_path_routes_around_hub() {
        // A -> Hub -> D (hub has 30 outlinks) vs A -> X -> Y -> D.
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "Hub.md", 1);
        g.add_edge("Hub.md", "D.md", 1);
        for i in 0..29 {
            g.add_edge("Hub.md", &format!("n{i}.md"), 2);
        }
        g.add_edge("A.md", "X.md", 2);
        g.add_edge("X.md", "Y.md", 1);
        g.add_edge("Y.md", "D.md", 1);

        let unweighted = g.shortest_path("A.md", "D.md", 5);
        assert_eq!(unweighted.length, 2); // plain BFS happily uses the hub

        let weighted = g.weighted_shortest_path("A.md", "D.md", 5);
        assert!(weighted.exists);
        assert_eq!(
            weighted.path,
            vec!["A.md", "X.md", "Y.md", "D.md"],
            "weighted route should avoid the hub"
        );
    }

    #[test]
    fn weighted_path_depth_bound() {
        let g = chain();
        let result = g.weighted_shortest_path("A.md", "C.md", 1);
        assert!(!result.exists);
    }

    #[test]
    fn common_neighbors_with_lines() {
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "Shared.md", 3);
        g.add_edge("A.md", "OnlyA.md", 4);
        g.add_edge("B.md", "Shared.md", 7);
        g.add_edge("B.md", "OnlyB.md", 8);
        let shared = g.common_neighbors("A.md", "B.md");
        assert_eq!(
            shared,
            vec![CommonNeighbor {
                target: "Shared.md".into(),
                line_a: 3,
                line_b: 7,
            }]
        );
    }

    #[test]
    fn bidirectional_pairs_deduped() {
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "B.md", 1);
        g.add_edge("B.md", "A.md", 1);
        g.add_edge("A.md", "C.md", 2);
        let pairs = g.bidirectional_links(None);
        assert_eq!(
            pairs,
            vec![BidirectionalPair {
                a: "A.md".into(),
                b: "B.md".into(),
            }]
        );
    }

    #[test]
    fn bidirectional_scope_filter() {
        let mut g = LinkGraph::new();
        g.add_edge("A.md", "B.md", 1);
        g.add_edge("B.md", "A.md", 1);
        let scope: HashSet<String> = ["A.md".to_string()].into();
        assert!(g.bidirectional_links(Some(&scope)).is_empty());
    }
}
