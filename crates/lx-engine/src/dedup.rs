//! Entity deduplication.
//!
//! Pairwise merge-candidate generation over the entity table, with tiered
//! match heuristics from strict to fuzzy. Dismissed pairs are filtered
//! against the durable store so they never resurface after a rebuild.

use serde::{Deserialize, Serialize};

use lx_core::{EntityRecord, LxResult};
use lx_store::RelevanceStore;

/// Shorter name must be at least this fraction of the longer for the fuzzy
/// tiers to apply.
const COMPARABLE_LENGTH_RATIO: f64 = 0.5;
/// Edit-distance tier cutoff: distance / max(len) must stay below this.
const EDIT_DISTANCE_MAX_RATIO: f64 = 0.35;

/// Why two entities were flagged as a duplicate pair, strictest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ExactName,
    NormalizedName,
    Substring { ratio: f64 },
    EditDistance { distance: usize, ratio: f64 },
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactName => f.write_str("exact name match"),
            Self::NormalizedName => f.write_str("normalized name match"),
            Self::Substring { .. } => f.write_str("substring containment"),
            Self::EditDistance { .. } => f.write_str("edit distance similarity"),
        }
    }
}

/// A proposed merge. `target` absorbs `source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub source: EntityRecord,
    pub target: EntityRecord,
    pub reason: MatchReason,
    pub confidence: f64,
}

/// Canonical fuzzy-match form of an entity name: lowercase alphanumerics
/// only, with a trailing "js"/"ts" platform suffix stripped. `None` when
/// too short to compare meaningfully.
pub fn normalized_name(name: &str) -> Option<String> {
    let mut flat: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    for suffix in ["js", "ts"] {
        if flat.len() > suffix.len() + 2 {
            if let Some(base) = flat.strip_suffix(suffix) {
                flat = base.to_string();
                break;
            }
        }
    }
    if flat.len() >= 3 {
        Some(flat)
    } else {
        None
    }
}

/// Match two entities against the tier ladder. `None` when they share a
/// path or no tier fires.
pub fn match_pair(a: &EntityRecord, b: &EntityRecord) -> Option<(MatchReason, f64)> {
    if a.path == b.path {
        return None;
    }
    // Names are stored lowercase, so equality here is the case-insensitive
    // exact match.
    if a.name == b.name {
        return Some((MatchReason::ExactName, 0.95));
    }

    let norm_a = normalized_name(&a.name)?;
    let norm_b = normalized_name(&b.name)?;
    if norm_a == norm_b {
        return Some((MatchReason::NormalizedName, 0.85));
    }

    let (shorter, longer) = if norm_a.len() <= norm_b.len() {
        (&norm_a, &norm_b)
    } else {
        (&norm_b, &norm_a)
    };
    let ratio = shorter.len() as f64 / longer.len() as f64;
    if ratio < COMPARABLE_LENGTH_RATIO {
        return None;
    }
    if longer.contains(shorter.as_str()) {
        return Some((MatchReason::Substring { ratio }, 0.6 + ratio * 0.2));
    }

    if norm_a.len() >= 4 && norm_b.len() >= 4 {
        let distance = strsim::levenshtein(&norm_a, &norm_b);
        let dist_ratio = distance as f64 / longer.len() as f64;
        if dist_ratio < EDIT_DISTANCE_MAX_RATIO {
            return Some((
                MatchReason::EditDistance {
                    distance,
                    ratio: dist_ratio,
                },
                0.5 + (1.0 - dist_ratio) * 0.4,
            ));
        }
    }

    None
}

/// The entity with the higher hub score absorbs the other; equal hubs fall
/// back to the longer name.
fn order_merge(a: EntityRecord, b: EntityRecord) -> (EntityRecord, EntityRecord) {
    let a_wins = match a.hub_score.cmp(&b.hub_score) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.name.len() >= b.name.len(),
    };
    if a_wins {
        (b, a)
    } else {
        (a, b)
    }
}

/// Generate merge candidates over the full entity set, excluding
/// previously dismissed pairs. Output is sorted by confidence, then by
/// the pair's names, so repeated scans are stable.
pub async fn merge_candidates(
    entities: &[EntityRecord],
    store: &dyn RelevanceStore,
) -> LxResult<Vec<MergeCandidate>> {
    let mut candidates = Vec::new();
    for (i, a) in entities.iter().enumerate() {
        for b in &entities[i + 1..] {
            let Some((reason, confidence)) = match_pair(a, b) else {
                continue;
            };
            if store.is_dismissed(&a.path, &b.path).await? {
                continue;
            }
            let (source, target) = order_merge(a.clone(), b.clone());
            candidates.push(MergeCandidate {
                source,
                target,
                reason,
                confidence,
            });
        }
    }
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.source.name.cmp(&b.source.name))
            .then_with(|| a.target.name.cmp(&b.target.name))
    });
    tracing::debug!(
        entities = entities.len(),
        candidates = candidates.len(),
        "dedup scan complete"
    );
    Ok(candidates)
}
