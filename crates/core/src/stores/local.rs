use crate::embeddings::cosine_similarity;
use crate::traits::VectorIndex;
use crate::{Chunk, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    dimensions: Option<usize>,
    entries: Vec<IndexedChunk>,
}

/// Brute-force cosine index kept in memory and persisted as one JSON file.
///
/// Writers build a complete new snapshot, persist it through a temp file and
/// rename, then swap the shared pointer. Queries clone the pointer and never
/// see a half-written index.
pub struct LocalVectorStore {
    directory: Option<PathBuf>,
    snapshot: RwLock<Arc<Snapshot>>,
    write_lock: Mutex<()>,
}

impl LocalVectorStore {
    pub fn in_memory() -> Self {
        Self {
            directory: None,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens a previously written index. A missing index file is `NotReady`,
    /// since there is nothing to answer from until ingestion runs.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        let path = directory.join(INDEX_FILE);
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotReady(format!(
                "no vector index at {}; run ingestion first",
                directory.display()
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        info!(path = %path.display(), chunks = snapshot.entries.len(), "vector index loaded");

        Ok(Self {
            directory: Some(directory),
            snapshot: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        })
    }

    /// Starts an empty index at `directory`. The file on disk is only
    /// replaced on the first write.
    pub async fn create(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        let store = Self {
            directory: Some(directory),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            write_lock: Mutex::new(()),
        };
        Ok(store)
    }

    async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    async fn commit(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        if let Some(directory) = &self.directory {
            tokio::fs::create_dir_all(directory).await?;
            let target = directory.join(INDEX_FILE);
            let staging = directory.join(format!("{INDEX_FILE}.tmp"));
            tokio::fs::write(&staging, serde_json::to_vec(&snapshot)?).await?;
            tokio::fs::rename(&staging, &target).await?;
        }

        *self.snapshot.write().await = Arc::new(snapshot);
        Ok(())
    }
}

fn pair_entries(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dimensions: Option<usize>,
) -> Result<(Vec<IndexedChunk>, Option<usize>), StoreError> {
    if chunks.len() != embeddings.len() {
        return Err(StoreError::Request(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    let mut dimensions = dimensions;
    let mut entries = Vec::with_capacity(chunks.len());
    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        let expected = *dimensions.get_or_insert(embedding.len());
        if embedding.len() != expected || expected == 0 {
            return Err(StoreError::Request(format!(
                "embedding dimension {} != {}",
                embedding.len(),
                expected
            )));
        }
        entries.push(IndexedChunk {
            chunk: chunk.clone(),
            embedding: embedding.clone(),
        });
    }
    Ok((entries, dimensions))
}

fn same_slot(left: &Chunk, right: &Chunk) -> bool {
    left.source_id() == right.source_id()
        && left.page() == right.page()
        && left.chunk_index() == right.chunk_index()
}

#[async_trait]
impl VectorIndex for LocalVectorStore {
    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.current().await;
        let (incoming, dimensions) = pair_entries(chunks, embeddings, current.dimensions)?;

        let mut entries: Vec<IndexedChunk> = current
            .entries
            .iter()
            .filter(|existing| !incoming.iter().any(|new| same_slot(&new.chunk, &existing.chunk)))
            .cloned()
            .collect();
        entries.extend(incoming);

        self.commit(Snapshot { dimensions, entries }).await
    }

    async fn replace(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let (entries, dimensions) = pair_entries(chunks, embeddings, None)?;
        self.commit(Snapshot { dimensions, entries }).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>, StoreError> {
        let snapshot = self.current().await;
        if let Some(dimensions) = snapshot.dimensions {
            if dimensions != embedding.len() {
                return Err(StoreError::Request(format!(
                    "query vector dim {} is not {}",
                    embedding.len(),
                    dimensions
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(embedding, &entry.embedding)))
            .collect();
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| (snapshot.entries[position].chunk.clone(), score))
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.current().await.entries.len())
    }
}
