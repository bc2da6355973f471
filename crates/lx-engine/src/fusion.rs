//! Reciprocal rank fusion.
//!
//! Each retrieval channel produces an ordered list of identifiers; fusion
//! scores an item by the sum of its reciprocal ranks across lists. No
//! cross-channel score calibration is needed since only positions matter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A retrieval channel contributing a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Lexical,
    Semantic,
    Entity,
    GraphEdge,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
            Self::Entity => "entity",
            Self::GraphEdge => "graph_edge",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexical" => Ok(Self::Lexical),
            "semantic" => Ok(Self::Semantic),
            "entity" => Ok(Self::Entity),
            "graph_edge" => Ok(Self::GraphEdge),
            _ => Err(format!("unknown channel: {s}")),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One channel's ordered output, best first.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub channel: Channel,
    pub ids: Vec<String>,
}

impl RankedList {
    pub fn new(channel: Channel, ids: Vec<String>) -> Self {
        Self { channel, ids }
    }
}

/// A fused result with the channels that contributed to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: String,
    pub score: f64,
    pub channels: Vec<Channel>,
}

/// Merge ranked lists by reciprocal rank. An item's score is
/// `Σ 1/(k + rank + 1)` over the lists containing it (rank 0-based);
/// absence from a list contributes nothing. Ties break by id so equal
/// scores produce a stable order.
pub fn reciprocal_rank_fusion(lists: &[RankedList], k: f64) -> Vec<FusedHit> {
    let mut scores: HashMap<&str, (f64, Vec<Channel>)> = HashMap::new();

    for list in lists {
        for (rank, id) in list.ids.iter().enumerate() {
            let entry = scores.entry(id.as_str()).or_insert_with(|| (0.0, Vec::new()));
            entry.0 += 1.0 / (k + rank as f64 + 1.0);
            if !entry.1.contains(&list.channel) {
                entry.1.push(list.channel);
            }
        }
    }

    let mut hits: Vec<FusedHit> = scores
        .into_iter()
        .map(|(id, (score, channels))| FusedHit {
            id: id.to_string(),
            score,
            channels,
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(channel: Channel, ids: &[&str]) -> RankedList {
        RankedList::new(channel, ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn first_everywhere_wins() {
        let lists = [
            list(Channel::Lexical, &["x", "a", "b"]),
            list(Channel::Semantic, &["x", "c"]),
            list(Channel::Entity, &["x", "a"]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused[0].id, "x");
        assert_eq!(fused[0].channels.len(), 3);
    }

    #[test]
    fn absence_contributes_zero() {
        let lists = [
            list(Channel::Lexical, &["a", "b"]),
            list(Channel::Semantic, &["b"]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        let a = fused.iter().find(|h| h.id == "a").unwrap();
        let b = fused.iter().find(|h| h.id == "b").unwrap();
        // a: 1/61 from one list; b: 1/62 + 1/61 from two.
        assert!((a.score - 1.0 / 61.0).abs() < 1e-12);
        assert!((b.score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert_eq!(fused[0].id, "b");
    }

    #[test]
    fn ties_break_by_id() {
        let lists = [
            list(Channel::Lexical, &["beta"]),
            list(Channel::Semantic, &["alpha"]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused[0].id, "alpha");
        assert_eq!(fused[1].id, "beta");
    }

    #[test]
    fn channel_annotations_deduplicated() {
        let lists = [
            list(Channel::Lexical, &["a"]),
            list(Channel::Lexical, &["a"]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused[0].channels, vec![Channel::Lexical]);
    }

    #[test]
    fn channel_round_trips() {
        for ch in [
            Channel::Lexical,
            Channel::Semantic,
            Channel::Entity,
            Channel::GraphEdge,
        ] {
            let parsed: Channel = ch.as_str().parse().unwrap();
            assert_eq!(parsed, ch);
        }
    }
}
