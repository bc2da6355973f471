use async_trait::async_trait;

use crate::error::LxResult;
use crate::model::{LexicalHit, SemanticHit};

/// Full-text retrieval channel backed by an inverted index.
pub trait LexicalChannel: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> LxResult<Vec<LexicalHit>>;
}

/// Embedding-similarity retrieval channel. Only consulted when an index has
/// actually been built; callers must tolerate `search` failing and degrade
/// that channel rather than the whole request.
#[async_trait]
pub trait SemanticChannel: Send + Sync {
    fn has_index(&self) -> bool;
    async fn embed(&self, text: &str) -> LxResult<Vec<f32>>;
    async fn search(&self, vector: &[f32], limit: usize) -> LxResult<Vec<SemanticHit>>;
}

/// Embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> LxResult<Vec<f32>>;
    fn dimensions(&self) -> usize;
}

fn _assert_object_safe(_: &dyn LexicalChannel, _: &dyn SemanticChannel, _: &dyn Embedder) {}
