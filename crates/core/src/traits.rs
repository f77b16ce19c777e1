use crate::{Chunk, ModelError, StoreError};
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Nearest-neighbour store over chunk embeddings. `query` returns at most
/// `k` hits sorted by descending score in `[0, 1]`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError>;

    /// Swaps the whole index for the given content. Readers observe either the
    /// previous or the new content, never a mix.
    async fn replace(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError>;

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}
