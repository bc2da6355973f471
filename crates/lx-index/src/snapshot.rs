//! The immutable Note Index snapshot.
//!
//! Built wholesale from the vault's file set; every retrieval request reads
//! one consistent snapshot. Backlinks, entities, and tag sets are derived
//! here on every build and never persisted.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use lx_core::{Backlink, EntityRecord, LxResult, Note};

/// Canonical key for entity/backlink lookup: lowercase, single-spaced.
pub fn normalize_name(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct VaultSnapshot {
    pub notes: HashMap<String, Note>,
    /// Canonical lowercase name (title or alias) to backing note path.
    /// One canonical path per name; first declaration wins.
    entities: HashMap<String, String>,
    /// Normalized link target to referencing sources. Includes targets with
    /// no backing note (dead links), which feed prospect detection.
    backlinks: HashMap<String, Vec<Backlink>>,
    /// Tag to the set of note paths carrying it.
    tags: HashMap<String, BTreeSet<String>>,
    /// Lowercased file stem to path, the near-miss resolution fallback.
    stems: HashMap<String, String>,
}

impl VaultSnapshot {
    /// Build a snapshot from parsed notes. Notes are indexed in path order
    /// so entity registration is deterministic across rebuilds.
    pub fn from_notes(mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.path.cmp(&b.path));

        let mut snapshot = Self::default();
        for note in &notes {
            let title_key = normalize_name(&note.title);
            if !title_key.is_empty() {
                snapshot
                    .entities
                    .entry(title_key)
                    .or_insert_with(|| note.path.clone());
            }
            for alias in &note.aliases {
                let key = normalize_name(alias);
                if !key.is_empty() {
                    snapshot.entities.entry(key).or_insert_with(|| note.path.clone());
                }
            }
            for tag in &note.tags {
                snapshot
                    .tags
                    .entry(tag.clone())
                    .or_default()
                    .insert(note.path.clone());
            }
            for link in &note.outlinks {
                let key = normalize_name(&link.target);
                if key.is_empty() {
                    continue;
                }
                snapshot.backlinks.entry(key).or_default().push(Backlink {
                    source: note.path.clone(),
                    line: link.line,
                });
            }
            let stem = Path::new(&note.path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_lowercase();
            if !stem.is_empty() {
                snapshot.stems.entry(stem).or_insert_with(|| note.path.clone());
            }
        }

        for note in notes {
            snapshot.notes.insert(note.path.clone(), note);
        }
        snapshot
    }

    /// Build a snapshot by walking a vault directory.
    pub fn load_dir(root: &Path) -> LxResult<Self> {
        let mut notes = Vec::new();
        for file in crate::vault::collect_md_files(root) {
            notes.push(crate::vault::parse_note_file(&file, root)?);
        }
        Ok(Self::from_notes(notes))
    }

    /// Resolve raw wikilink target text to a note path: exact title, alias,
    /// then file-stem near miss. Returns `None` for dead links.
    pub fn resolve(&self, target: &str) -> Option<&str> {
        let key = normalize_name(target);
        if key.is_empty() {
            return None;
        }
        if let Some(path) = self.entities.get(&key) {
            return Some(path);
        }
        self.stems.get(&key).map(String::as_str)
    }

    pub fn note(&self, path: &str) -> Option<&Note> {
        self.notes.get(path)
    }

    pub fn backlinks_of(&self, name: &str) -> &[Backlink] {
        self.backlinks
            .get(&normalize_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Backlink count for a name; the hub score. Recomputed here, never
    /// stored authoritatively.
    pub fn hub_score(&self, name: &str) -> usize {
        self.backlinks_of(name).len()
    }

    pub fn notes_tagged(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.tags.get(tag)
    }

    /// All entities with hub scores filled in, for the deduplicator and the
    /// suggestion engine.
    pub fn entity_records(&self) -> Vec<EntityRecord> {
        let mut records: Vec<EntityRecord> = self
            .entities
            .iter()
            .map(|(name, path)| {
                let mut record = EntityRecord::new(name.clone(), path.clone())
                    .with_hub_score(self.hub_score(name));
                if let Some(note) = self.notes.get(path) {
                    record = record.with_aliases(note.aliases.clone());
                    if let Some(cat) = note.frontmatter.get("category").and_then(|v| v.as_str()) {
                        record = record.with_category(cat);
                    }
                }
                record
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Link targets referenced somewhere in the vault that resolve to no
    /// note, with their backlinks. Raw casing is lost; keys are normalized.
    pub fn dead_link_targets(&self) -> Vec<(&str, &[Backlink])> {
        let mut dead: Vec<(&str, &[Backlink])> = self
            .backlinks
            .iter()
            .filter(|(name, _)| self.resolve(name).is_none())
            .map(|(name, links)| (name.as_str(), links.as_slice()))
            .collect();
        dead.sort_by_key(|(name, _)| *name);
        dead
    }

    /// Outlinks of a note resolved to paths, declaration order preserved,
    /// unresolvable targets dropped.
    pub fn resolved_outlinks(&self, path: &str) -> Vec<(String, usize)> {
        let Some(note) = self.notes.get(path) else {
            return Vec::new();
        };
        note.outlinks
            .iter()
            .filter_map(|l| self.resolve(&l.target).map(|p| (p.to_string(), l.line)))
            .collect()
    }
}
