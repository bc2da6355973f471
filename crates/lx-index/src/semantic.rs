//! Embedding-similarity channel: cosine search over per-note vectors.
//!
//! The index is built through the `Embedder` trait so real providers stay
//! pluggable. `HashingEmbedder` is the deterministic in-process fallback:
//! a token-hash projection that gives related texts correlated vectors
//! without any model download.

use std::collections::HashMap;

use async_trait::async_trait;

use lx_core::{Embedder, LxError, LxResult, Note, SemanticChannel, SemanticHit};

use crate::lexical::{stem, tokenize};

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_l = 0.0f64;
    let mut norm_r = 0.0f64;
    for (l, r) in left.iter().zip(right.iter()) {
        dot += (*l as f64) * (*r as f64);
        norm_l += (*l as f64) * (*l as f64);
        norm_r += (*r as f64) * (*r as f64);
    }
    if norm_l == 0.0 || norm_r == 0.0 {
        return 0.0;
    }
    dot / (norm_l.sqrt() * norm_r.sqrt())
}

// ---------------------------------------------------------------------------
// Hashing embedder
// ---------------------------------------------------------------------------

/// Deterministic bag-of-stems projection into a fixed-dimension space.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a; stable across runs and platforms.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dims as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> LxResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            vector[self.bucket(&stem(&token))] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

// ---------------------------------------------------------------------------
// Embedding index
// ---------------------------------------------------------------------------

struct EmbeddingRow {
    title: String,
    vector: Vec<f32>,
}

/// Cosine-similarity index over note embeddings.
pub struct EmbeddingIndex<E> {
    embedder: E,
    rows: HashMap<String, EmbeddingRow>,
}

impl<E: Embedder> EmbeddingIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            rows: HashMap::new(),
        }
    }

    /// Embed every note's title and body. Failures abort the build;
    /// a partially-built index is never exposed.
    pub async fn build<'a, I>(embedder: E, notes: I) -> LxResult<Self>
    where
        I: IntoIterator<Item = &'a Note>,
    {
        let mut index = Self::new(embedder);
        for note in notes {
            index.upsert(note).await?;
        }
        Ok(index)
    }

    pub async fn upsert(&mut self, note: &Note) -> LxResult<()> {
        let text = format!("{} {}", note.title, note.body);
        let vector = self.embedder.embed(&text).await?;
        self.rows.insert(
            note.path.clone(),
            EmbeddingRow {
                title: note.title.clone(),
                vector,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl<E: Embedder> SemanticChannel for EmbeddingIndex<E> {
    fn has_index(&self) -> bool {
        !self.rows.is_empty()
    }

    async fn embed(&self, text: &str) -> LxResult<Vec<f32>> {
        self.embedder.embed(text).await
    }

    async fn search(&self, vector: &[f32], limit: usize) -> LxResult<Vec<SemanticHit>> {
        if !self.has_index() {
            return Err(LxError::Index("embedding index not built".into()));
        }
        let mut hits: Vec<SemanticHit> = self
            .rows
            .iter()
            .map(|(path, row)| SemanticHit {
                path: path.clone(),
                title: row.title.clone(),
                similarity: cosine_similarity(vector, &row.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("rust borrow checker").await.unwrap();
        let b = embedder.embed("rust borrow checker").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), embedder.dimensions());
    }

    #[tokio::test]
    async fn similar_texts_score_higher() {
        let notes = vec![
            Note::new("rust.md", "Rust").with_body("ownership borrowing lifetimes compiler"),
            Note::new("cooking.md", "Cooking").with_body("garlic onion butter simmer saucepan"),
        ];
        let index = EmbeddingIndex::build(HashingEmbedder::default(), &notes)
            .await
            .unwrap();
        assert!(index.has_index());

        let query = index.embed("borrowing and ownership in rust").await.unwrap();
        let hits = index.search(&query, 10).await.unwrap();
        assert_eq!(hits[0].path, "rust.md");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn empty_index_reports_unavailable() {
        let index = EmbeddingIndex::new(HashingEmbedder::default());
        assert!(!index.has_index());
        let err = index.search(&[0.0; 256], 5).await;
        assert!(err.is_err());
    }
}
