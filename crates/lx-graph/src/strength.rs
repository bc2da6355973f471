//! Connection strength between two notes, with itemized factors so the
//! score stays explainable.

use serde::{Deserialize, Serialize};

use lx_index::snapshot::VaultSnapshot;

use crate::traversal::LinkGraph;

/// Score for a mutual A↔B link.
pub const MUTUAL_LINK_SCORE: f64 = 3.0;
/// Score for a one-directional link either way.
pub const ONE_WAY_LINK_SCORE: f64 = 1.0;
/// Score per tag both notes carry.
pub const SHARED_TAG_SCORE: f64 = 1.0;
/// Score per outlink target both notes share.
pub const SHARED_LINK_SCORE: f64 = 0.5;
/// Score when both notes live in the same folder.
pub const SAME_FOLDER_SCORE: f64 = 1.0;

/// Itemized connection factors. `total()` is always the sum of the parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStrength {
    /// 3.0 mutual, 1.0 one-way, 0.0 unlinked.
    pub link_score: f64,
    pub shared_tags: Vec<String>,
    pub shared_link_count: usize,
    pub same_folder: bool,
}

impl ConnectionStrength {
    pub fn total(&self) -> f64 {
        self.link_score
            + self.shared_tags.len() as f64 * SHARED_TAG_SCORE
            + self.shared_link_count as f64 * SHARED_LINK_SCORE
            + if self.same_folder { SAME_FOLDER_SCORE } else { 0.0 }
    }
}

fn links_to(snapshot: &VaultSnapshot, from: &str, to: &str) -> bool {
    snapshot
        .resolved_outlinks(from)
        .iter()
        .any(|(target, _)| target == to)
}

/// Additive connection score between two notes. `None` when either path is
/// not in the snapshot; unresolved endpoints are a result, not an error.
pub fn connection_strength(
    snapshot: &VaultSnapshot,
    graph: &LinkGraph,
    a: &str,
    b: &str,
) -> Option<ConnectionStrength> {
    let note_a = snapshot.note(a)?;
    let note_b = snapshot.note(b)?;

    let a_to_b = links_to(snapshot, a, b);
    let b_to_a = links_to(snapshot, b, a);
    let link_score = match (a_to_b, b_to_a) {
        (true, true) => MUTUAL_LINK_SCORE,
        (true, false) | (false, true) => ONE_WAY_LINK_SCORE,
        (false, false) => 0.0,
    };

    let mut shared_tags: Vec<String> = note_a
        .tags
        .iter()
        .filter(|t| note_b.tags.contains(t))
        .cloned()
        .collect();
    shared_tags.sort();
    shared_tags.dedup();

    let shared_link_count = graph.common_neighbors(a, b).len();
    let same_folder = note_a.folder() == note_b.folder();

    Some(ConnectionStrength {
        link_score,
        shared_tags,
        shared_link_count,
        same_folder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lx_core::{Note, Outlink};

    fn snapshot() -> VaultSnapshot {
        VaultSnapshot::from_notes(vec![
            Note::new("work/Alpha.md", "Alpha")
                .with_tags(vec!["project".into(), "active".into()])
                .with_outlinks(vec![Outlink::new("Beta", 2), Outlink::new("Gamma", 3)]),
            Note::new("work/Beta.md", "Beta")
                .with_tags(vec!["project".into()])
                .with_outlinks(vec![Outlink::new("Alpha", 1), Outlink::new("Gamma", 4)]),
            Note::new("misc/Gamma.md", "Gamma"),
        ])
    }

    #[test]
    fn mutual_pair_scores_all_factors() {
        let snap = snapshot();
        let graph = LinkGraph::from_snapshot(&snap);
        let s = connection_strength(&snap, &graph, "work/Alpha.md", "work/Beta.md").unwrap();

        assert_eq!(s.link_score, MUTUAL_LINK_SCORE);
        assert_eq!(s.shared_tags, vec!["project".to_string()]);
        assert_eq!(s.shared_link_count, 1); // both link Gamma
        assert!(s.same_folder);
        // 3 (mutual) + 1 (tag) + 0.5 (shared link) + 1 (folder)
        assert!((s.total() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn one_way_link_scores_one() {
        let snap = snapshot();
        let graph = LinkGraph::from_snapshot(&snap);
        let s = connection_strength(&snap, &graph, "work/Alpha.md", "misc/Gamma.md").unwrap();
        assert_eq!(s.link_score, ONE_WAY_LINK_SCORE);
        assert!(!s.same_folder);
        assert!(s.shared_tags.is_empty());
    }

    #[test]
    fn unknown_note_yields_none() {
        let snap = snapshot();
        let graph = LinkGraph::from_snapshot(&snap);
        assert!(connection_strength(&snap, &graph, "work/Alpha.md", "Nope.md").is_none());
    }

    #[test]
    fn unrelated_notes_score_zero_link() {
        let snap = VaultSnapshot::from_notes(vec![
            Note::new("a/One.md", "One"),
            Note::new("b/Two.md", "Two"),
        ]);
        let graph = LinkGraph::from_snapshot(&snap);
        let s = connection_strength(&snap, &graph, "a/One.md", "b/Two.md").unwrap();
        assert_eq!(s.total(), 0.0);
    }
}
