use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// One vault note. The `path` is the sole identity; outlinks hold the raw
/// target text as written and are resolved lazily against a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub path: String,
    pub title: String,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub frontmatter: HashMap<String, serde_json::Value>,
    pub outlinks: Vec<Outlink>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Note {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            title: title.into(),
            aliases: Vec::new(),
            tags: Vec::new(),
            frontmatter: HashMap::new(),
            outlinks: Vec::new(),
            body: String::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_outlinks(mut self, outlinks: Vec<Outlink>) -> Self {
        self.outlinks = outlinks;
        self
    }

    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }

    /// Folder portion of the path, empty for root-level notes.
    pub fn folder(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }
}

/// A wikilink as declared in a note body: raw target text plus the
/// 1-based line it appears on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlink {
    pub target: String,
    pub line: usize,
}

impl Outlink {
    pub fn new(target: impl Into<String>, line: usize) -> Self {
        Self {
            target: target.into(),
            line,
        }
    }
}

/// A reference to a target from some source note. Derived from the note set
/// on every rebuild, never persisted independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlink {
    pub source: String,
    pub line: usize,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A canonical named concept backed by a note. `name` is lowercase; lookup
/// is case-insensitive. The hub score is the backlink count, recomputed from
/// the snapshot rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub path: String,
    pub category: Option<String>,
    pub aliases: Vec<String>,
    pub hub_score: usize,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            path: path.into(),
            category: None,
            aliases: Vec::new(),
            hub_score: 0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_hub_score(mut self, hub_score: usize) -> Self {
        self.hub_score = hub_score;
        self
    }
}

// ---------------------------------------------------------------------------
// Channel hits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalHit {
    pub path: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticHit {
    pub path: String,
    pub title: String,
    pub similarity: f64,
}

// ---------------------------------------------------------------------------
// Score breakdown
// ---------------------------------------------------------------------------

/// Per-candidate decomposition of a recall score. The reported total is
/// always the exact sum of the components so each contribution stays
/// independently inspectable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub text_relevance: f64,
    pub recency_boost: f64,
    pub cooccurrence_boost: f64,
    pub feedback_boost: f64,
    pub edge_weight_boost: f64,
    pub semantic_boost: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.text_relevance
            + self.recency_boost
            + self.cooccurrence_boost
            + self.feedback_boost
            + self.edge_weight_boost
            + self.semantic_boost
    }
}

// ---------------------------------------------------------------------------
// Confidence tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("unknown confidence tier: {s}")),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_of_nested_and_root_paths() {
        let nested = Note::new("projects/alpha/Kickoff.md", "Kickoff");
        assert_eq!(nested.folder(), "projects/alpha");

        let root = Note::new("Inbox.md", "Inbox");
        assert_eq!(root.folder(), "");
    }

    #[test]
    fn breakdown_total_is_component_sum() {
        let b = ScoreBreakdown {
            text_relevance: 10.0,
            recency_boost: 4.0,
            cooccurrence_boost: 1.5,
            feedback_boost: 2.0,
            edge_weight_boost: 3.0,
            semantic_boost: 4.5,
        };
        assert!((b.total() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_round_trips() {
        for tier in [Confidence::Low, Confidence::Medium, Confidence::High] {
            let parsed: Confidence = tier.as_str().parse().unwrap();
            assert_eq!(parsed, tier);
        }
        assert!(Confidence::High > Confidence::Medium);
    }

    #[test]
    fn entity_name_lowercased() {
        let e = EntityRecord::new("React", "tools/React.md");
        assert_eq!(e.name, "react");
    }
}
