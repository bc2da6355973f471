use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use lx_core::{linear_decay, LxError, LxResult};

use crate::{sorted_pair, MemoryFact, RelevanceStore, StoredEdge};

/// SQLite-backed relevance store.
pub struct SqliteRelevanceStore {
    conn: Mutex<Connection>,
}

impl SqliteRelevanceStore {
    pub fn open(path: &std::path::Path) -> LxResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| LxError::Storage(format!("failed to open sqlite: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|e| LxError::Storage(format!("pragma error: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    /// In-memory store for testing.
    pub fn open_in_memory() -> LxResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LxError::Storage(format!("open in-memory: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> LxResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS edge_weights (
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 1.0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (source, target)
            );
            CREATE INDEX IF NOT EXISTS idx_edge_source ON edge_weights(source);
            CREATE TABLE IF NOT EXISTS dismissals (
                path_a TEXT NOT NULL,
                path_b TEXT NOT NULL,
                dismissed_at TEXT NOT NULL,
                PRIMARY KEY (path_a, path_b)
            );
            CREATE TABLE IF NOT EXISTS feedback (
                entity TEXT PRIMARY KEY NOT NULL,
                boost REAL NOT NULL DEFAULT 0.0
            );
            CREATE TABLE IF NOT EXISTS cooccurrence (
                entity TEXT PRIMARY KEY NOT NULL,
                boost REAL NOT NULL DEFAULT 0.0
            );
            CREATE TABLE IF NOT EXISTS facts (
                id TEXT PRIMARY KEY NOT NULL,
                text TEXT NOT NULL,
                last_mentioned_at TEXT NOT NULL
            );",
        )
        .map_err(|e| LxError::Storage(format!("create tables: {e}")))?;
        tracing::debug!("relevance store schema ready");
        Ok(())
    }

    /// Like `reinforce_edge` but with an explicit clock, so tests can
    /// backdate an edge and observe decay.
    pub fn reinforce_edge_at(&self, source: &str, target: &str, when: DateTime<Utc>) -> LxResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO edge_weights (source, target, weight, updated_at)
             VALUES (?1, ?2, 1.0, ?3)
             ON CONFLICT(source, target)
             DO UPDATE SET weight = weight + 1.0, updated_at = ?3",
            params![source, target, when.to_rfc3339()],
        )
        .map_err(|e| LxError::Storage(format!("reinforce edge: {e}")))?;
        Ok(())
    }

    fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, f64, DateTime<Utc>)> {
        let source: String = row.get(0)?;
        let target: String = row.get(1)?;
        let weight: f64 = row.get(2)?;
        let updated_at_str: String = row.get(3)?;
        let updated_at = parse_dt(3, &updated_at_str)?;
        Ok((source, target, weight, updated_at))
    }
}

fn parse_dt(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

/// Stored weight scaled by how long ago the edge was last reinforced.
pub fn effective_weight(stored: f64, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - updated_at).num_seconds() as f64 / 86_400.0;
    stored * linear_decay(days)
}

#[async_trait]
impl RelevanceStore for SqliteRelevanceStore {
    async fn reinforce_edge(&self, source: &str, target: &str) -> LxResult<()> {
        self.reinforce_edge_at(source, target, Utc::now())
    }

    async fn edge_weight(&self, source: &str, target: &str) -> LxResult<Option<f64>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let row: Option<(f64, String)> = conn
            .query_row(
                "SELECT weight, updated_at FROM edge_weights WHERE source = ?1 AND target = ?2",
                params![source, target],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| LxError::Storage(e.to_string()))?;

        match row {
            Some((weight, updated_at_str)) => {
                let updated_at = parse_dt(1, &updated_at_str)
                    .map_err(|e| LxError::Storage(e.to_string()))?;
                Ok(Some(effective_weight(weight, updated_at, Utc::now())))
            }
            None => Ok(None),
        }
    }

    async fn edges_for(&self, source: &str, threshold: f64) -> LxResult<Vec<StoredEdge>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT source, target, weight, updated_at FROM edge_weights WHERE source = ?1",
            )
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params![source], SqliteRelevanceStore::row_to_edge)
            .map_err(|e| LxError::Storage(e.to_string()))?;

        let now = Utc::now();
        let mut edges = Vec::new();
        for row in rows {
            let (source, target, stored, updated_at) =
                row.map_err(|e| LxError::Storage(e.to_string()))?;
            let weight = effective_weight(stored, updated_at, now);
            if weight > threshold {
                edges.push(StoredEdge {
                    source,
                    target,
                    weight,
                    updated_at,
                });
            }
        }
        // Decay happens at read time, so ordering must too.
        edges.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.target.cmp(&b.target))
        });
        Ok(edges)
    }

    async fn dismiss_pair(&self, a: &str, b: &str) -> LxResult<()> {
        let (first, second) = sorted_pair(a, b);
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO dismissals (path_a, path_b, dismissed_at) VALUES (?1, ?2, ?3)",
            params![first, second, Utc::now().to_rfc3339()],
        )
        .map_err(|e| LxError::Storage(format!("dismiss pair: {e}")))?;
        Ok(())
    }

    async fn is_dismissed(&self, a: &str, b: &str) -> LxResult<bool> {
        let (first, second) = sorted_pair(a, b);
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM dismissals WHERE path_a = ?1 AND path_b = ?2",
                params![first, second],
                |row| row.get(0),
            )
            .map_err(|e| LxError::Storage(e.to_string()))?;
        Ok(count > 0)
    }

    async fn record_feedback(&self, entity: &str, boost: f64) -> LxResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO feedback (entity, boost) VALUES (?1, ?2)
             ON CONFLICT(entity) DO UPDATE SET boost = boost + ?2",
            params![entity, boost],
        )
        .map_err(|e| LxError::Storage(format!("record feedback: {e}")))?;
        Ok(())
    }

    async fn feedback_boost(&self, entity: &str) -> LxResult<f64> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let boost: Option<f64> = conn
            .query_row(
                "SELECT boost FROM feedback WHERE entity = ?1",
                params![entity],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        Ok(boost.unwrap_or(0.0))
    }

    async fn record_cooccurrence(&self, entity: &str, boost: f64) -> LxResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO cooccurrence (entity, boost) VALUES (?1, ?2)
             ON CONFLICT(entity) DO UPDATE SET boost = boost + ?2",
            params![entity, boost],
        )
        .map_err(|e| LxError::Storage(format!("record cooccurrence: {e}")))?;
        Ok(())
    }

    async fn cooccurrence_boost(&self, entity: &str) -> LxResult<f64> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let boost: Option<f64> = conn
            .query_row(
                "SELECT boost FROM cooccurrence WHERE entity = ?1",
                params![entity],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        Ok(boost.unwrap_or(0.0))
    }

    async fn upsert_fact(&self, fact: &MemoryFact) -> LxResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO facts (id, text, last_mentioned_at) VALUES (?1, ?2, ?3)",
            params![fact.id, fact.text, fact.last_mentioned_at.to_rfc3339()],
        )
        .map_err(|e| LxError::Storage(format!("upsert fact: {e}")))?;
        Ok(())
    }

    async fn list_facts(&self) -> LxResult<Vec<MemoryFact>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT id, text, last_mentioned_at FROM facts ORDER BY last_mentioned_at DESC, id")
            .map_err(|e| LxError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let text: String = row.get(1)?;
                let at_str: String = row.get(2)?;
                let last_mentioned_at = parse_dt(2, &at_str)?;
                Ok(MemoryFact {
                    id,
                    text,
                    last_mentioned_at,
                })
            })
            .map_err(|e| LxError::Storage(e.to_string()))?;

        let mut facts = Vec::new();
        for row in rows {
            facts.push(row.map_err(|e| LxError::Storage(e.to_string()))?);
        }
        Ok(facts)
    }
}
