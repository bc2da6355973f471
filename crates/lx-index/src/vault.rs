//! Parsing of vault markdown files into `Note` values.
//!
//! Handles the YAML-style frontmatter block (simple `key: value` pairs,
//! inline `[a, b]` arrays, and `- item` list continuations) and wikilink
//! extraction with line numbers. Parses manually; no YAML crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use lx_core::{LxError, LxResult, Note, Outlink};

/// Collect all `.md` files under a vault root, skipping dotted
/// directories (`.obsidian`, `.git`, `.trash`).
pub fn collect_md_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("md") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

/// Parse a single markdown file into a `Note`.
pub fn parse_note_file(file_path: &Path, vault_root: &Path) -> LxResult<Note> {
    let relative = file_path
        .strip_prefix(vault_root)
        .map_err(|e| LxError::InvalidInput(format!("path outside vault root: {e}")))?;
    let relative_str = relative.to_string_lossy().replace('\\', "/");

    let raw = std::fs::read_to_string(file_path)
        .map_err(|e| LxError::Storage(format!("read file {}: {e}", file_path.display())))?;

    let meta = std::fs::metadata(file_path)
        .map_err(|e| LxError::Storage(format!("stat file {}: {e}", file_path.display())))?;
    let modified: DateTime<Utc> = meta
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let created: DateTime<Utc> = meta
        .created()
        .map(DateTime::from)
        .unwrap_or(modified);

    Ok(parse_note_content(&relative_str, &raw, created, modified))
}

/// Parse note content that is already in memory. Identity is the relative
/// path; the title falls back to the file stem when frontmatter omits one.
pub fn parse_note_content(
    relative_path: &str,
    raw: &str,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
) -> Note {
    let (frontmatter, body) = parse_frontmatter(raw);

    let title = frontmatter
        .get("title")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| file_stem(relative_path));

    let aliases = string_list(&frontmatter, "aliases");
    let tags = string_list(&frontmatter, "tags");
    let outlinks = extract_outlinks(raw);

    let mut note = Note::new(relative_path, title)
        .with_aliases(aliases)
        .with_tags(tags)
        .with_body(body)
        .with_outlinks(outlinks);
    note.created_at = created_at;
    note.modified_at = modified_at;
    note.frontmatter = frontmatter;
    note
}

/// Extract wikilink outlinks `[[Target]]`, `[[Target|alias]]`,
/// `[[Target#heading]]` with the 1-based line each appears on.
/// Declaration order is preserved so downstream traversal stays
/// deterministic. Duplicate targets on different lines are kept.
pub fn extract_outlinks(raw: &str) -> Vec<Outlink> {
    let mut links = Vec::new();
    for (line_idx, line) in raw.lines().enumerate() {
        let mut rest = line;
        let mut consumed = 0usize;
        while let Some(open) = rest.find("[[") {
            let after_open = open + 2;
            let Some(close_rel) = rest[after_open..].find("]]") else {
                break;
            };
            let inner = &rest[after_open..after_open + close_rel];
            let target = inner.split_once('|').map_or(inner, |(t, _)| t);
            let target = target.split_once('#').map_or(target, |(t, _)| t).trim();
            if !target.is_empty() {
                links.push(Outlink::new(target, line_idx + 1));
            }
            consumed += after_open + close_rel + 2;
            rest = &line[consumed..];
        }
    }
    links
}

/// Split off the leading frontmatter fence: the content between an opening
/// `---` first line and the next line that is exactly `---`. Fences are
/// matched per line, so dashes inside the body never terminate the block,
/// and an unterminated opener leaves the whole content as body.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let after_open = content.strip_prefix("---\n")?;
    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&after_open[..offset], &after_open[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim_matches('\'')
}

/// Parse frontmatter fields into a value map and return the body. Values
/// are strings or arrays of strings; retrieval only ever reads titles,
/// aliases, tags, and categories, so scalars are kept as written rather
/// than coerced. A key with no inline value opens a `- item` list on the
/// following lines.
pub fn parse_frontmatter(content: &str) -> (HashMap<String, serde_json::Value>, String) {
    let Some((block, body)) = split_frontmatter(content) else {
        return (HashMap::new(), content.to_string());
    };

    let mut fields: HashMap<String, serde_json::Value> = HashMap::new();
    let mut open_list: Option<(String, Vec<serde_json::Value>)> = None;

    for raw_line in block.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(item) = line.strip_prefix("- ") {
            if let Some((_, items)) = open_list.as_mut() {
                let item = unquote(item);
                if !item.is_empty() {
                    items.push(serde_json::Value::String(item.to_string()));
                }
                continue;
            }
        }
        if let Some((key, items)) = open_list.take() {
            fields.insert(key, serde_json::Value::Array(items));
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim();

        if value.is_empty() {
            open_list = Some((key, Vec::new()));
        } else if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            let items = inner
                .split(',')
                .map(unquote)
                .filter(|s| !s.is_empty())
                .map(|s| serde_json::Value::String(s.to_string()))
                .collect();
            fields.insert(key, serde_json::Value::Array(items));
        } else {
            fields.insert(key, serde_json::Value::String(unquote(value).to_string()));
        }
    }
    if let Some((key, items)) = open_list {
        fields.insert(key, serde_json::Value::Array(items));
    }

    (fields, body.trim().to_string())
}

/// Read a frontmatter key as a list of strings (array or comma-separated).
fn string_list(frontmatter: &HashMap<String, serde_json::Value>, key: &str) -> Vec<String> {
    let mut out = Vec::new();
    match frontmatter.get(key) {
        Some(serde_json::Value::Array(arr)) => {
            for item in arr {
                if let Some(s) = item.as_str() {
                    let trimmed = s.trim().to_string();
                    if !trimmed.is_empty() {
                        out.push(trimmed);
                    }
                }
            }
        }
        Some(serde_json::Value::String(s)) => {
            for part in s.split(',') {
                let trimmed = part.trim().to_string();
                if !trimmed.is_empty() {
                    out.push(trimmed);
                }
            }
        }
        _ => {}
    }
    out
}

fn file_stem(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlinks_carry_line_numbers() {
        let raw = "First line\nSee [[Project Alpha]] here\n\nAnd [[Roadmap#Q1|the plan]]";
        let links = extract_outlinks(raw);
        assert_eq!(
            links,
            vec![
                Outlink::new("Project Alpha", 2),
                Outlink::new("Roadmap", 4),
            ]
        );
    }

    #[test]
    fn multiple_outlinks_on_one_line() {
        let raw = "[[A]] then [[B]] then [[A]]";
        let links = extract_outlinks(raw);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].target, "A");
        assert_eq!(links[1].target, "B");
        assert_eq!(links[2].target, "A");
        assert!(links.iter().all(|l| l.line == 1));
    }

    #[test]
    fn empty_wikilinks_skipped() {
        let raw = "[[]] and [[ ]] and [[Real]]";
        let links = extract_outlinks(raw);
        assert_eq!(links, vec![Outlink::new("Real", 1)]);
    }

    #[test]
    fn frontmatter_title_aliases_tags() {
        let raw = "---\ntitle: Acme Corp\naliases: [Acme, ACME Inc]\ntags:\n- company\n- client\n---\nBody text.";
        let note = parse_note_content("orgs/Acme Corp.md", raw, Utc::now(), Utc::now());
        assert_eq!(note.title, "Acme Corp");
        assert_eq!(note.aliases, vec!["Acme", "ACME Inc"]);
        assert_eq!(note.tags, vec!["company", "client"]);
        assert_eq!(note.body, "Body text.");
    }

    #[test]
    fn title_falls_back_to_stem() {
        let note = parse_note_content("people/Bob Smith.md", "No frontmatter", Utc::now(), Utc::now());
        assert_eq!(note.title, "Bob Smith");
        assert!(note.frontmatter.is_empty());
    }

    #[test]
    fn tags_from_comma_separated_string() {
        let raw = "---\ntags: alpha, beta\n---\nX";
        let note = parse_note_content("n.md", raw, Utc::now(), Utc::now());
        assert_eq!(note.tags, vec!["alpha", "beta"]);
    }

    #[test]
    fn unterminated_frontmatter_passes_through() {
        // Dashes inside a line are not a closing fence.
        let raw = "---\ntitle: X\ndashes --- mid line\nno closing fence";
        let note = parse_note_content("n.md", raw, Utc::now(), Utc::now());
        assert!(note.frontmatter.is_empty());
        assert_eq!(note.title, "n");
        assert!(note.body.contains("no closing fence"));
    }

    #[test]
    fn scalars_stay_strings_and_empty_lists_are_kept() {
        let raw = "---\ncategory: \"person\"\npinned: true\nprojects:\n---\nX";
        let note = parse_note_content("n.md", raw, Utc::now(), Utc::now());
        assert_eq!(
            note.frontmatter.get("category").and_then(|v| v.as_str()),
            Some("person")
        );
        assert_eq!(
            note.frontmatter.get("pinned").and_then(|v| v.as_str()),
            Some("true")
        );
        assert_eq!(note.frontmatter.get("projects"), Some(&serde_json::json!([])));
    }

    #[test]
    fn collect_and_parse_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("projects")).unwrap();
        std::fs::write(
            dir.path().join("projects/Alpha.md"),
            "---\ntitle: Alpha\n---\nLinks to [[Beta]]",
        )
        .unwrap();
        std::fs::write(dir.path().join("Beta.md"), "Plain note").unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(dir.path().join(".obsidian/cache.md"), "hidden").unwrap();

        let files = collect_md_files(dir.path());
        assert_eq!(files.len(), 2);

        let note = parse_note_file(&dir.path().join("projects/Alpha.md"), dir.path()).unwrap();
        assert_eq!(note.path, "projects/Alpha.md");
        assert_eq!(note.folder(), "projects");
        assert_eq!(note.outlinks, vec![Outlink::new("Beta", 4)]);
    }
}
