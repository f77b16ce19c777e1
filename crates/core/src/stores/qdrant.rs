use crate::traits::VectorIndex;
use crate::{Chunk, StoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant over its REST API. Queries go through `alias`; `replace` fills a
/// fresh collection and then repoints the alias in one request.
pub struct QdrantStore {
    endpoint: Url,
    alias: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(endpoint: &str, alias: impl Into<String>, vector_size: usize) -> Result<Self, StoreError> {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Ok(Self {
            endpoint: Url::parse(&endpoint)?,
            alias: alias.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.endpoint.join(path)?)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "embedding dimension {} != {}",
                vector.len(),
                self.vector_size
            )));
        }
        Ok(())
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.url(&format!("collections/{name}"))?)
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        ensure_success(response.status())
    }

    async fn upsert_into(
        &self,
        collection: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let points = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                self.check_dimensions(embedding)?;
                Ok(json!({
                    "id": point_id(chunk).to_string(),
                    "vector": embedding,
                    "payload": {
                        "content": chunk.content(),
                        "source_id": chunk.source_id(),
                        "page": chunk.page(),
                        "chunk_index": chunk.chunk_index(),
                    },
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.url(&format!("collections/{collection}/points?wait=true"))?)
            .json(&json!({ "points": points }))
            .send()
            .await?;
        ensure_success(response.status())
    }

    async fn aliased_collection(&self) -> Result<Option<String>, StoreError> {
        let response = self
            .client
            .get(self.url("aliases")?)
            .send()
            .await?;
        ensure_success(response.status())?;

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/aliases")
            .and_then(Value::as_array)
            .and_then(|aliases| {
                aliases.iter().find_map(|alias| {
                    let matches = alias.pointer("/alias_name").and_then(Value::as_str) == Some(self.alias.as_str());
                    matches
                        .then(|| alias.pointer("/collection_name").and_then(Value::as_str))
                        .flatten()
                        .map(str::to_string)
                })
            }))
    }
}

fn ensure_success(status: StatusCode) -> Result<(), StoreError> {
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotReady(format!("{BACKEND} collection missing")));
    }
    if !status.is_success() {
        return Err(StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: status.to_string(),
        });
    }
    Ok(())
}

/// Stable id derived from the chunk's position in the corpus.
fn point_id(chunk: &Chunk) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(chunk.source_id().as_bytes());
    hasher.update(chunk.page().to_le_bytes());
    hasher.update(chunk.chunk_index().to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// A hit without text content or a score is a malformed response, not a
/// miss.
fn parse_hit(hit: &Value) -> Result<(Chunk, f32), StoreError> {
    let malformed = |details: &str| StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    };

    let payload = hit
        .pointer("/payload")
        .ok_or_else(|| malformed("search hit has no payload"))?;
    let content = payload
        .pointer("/content")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("search hit payload has no content"))?;
    let score = hit
        .pointer("/score")
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("search hit has no score"))? as f32;
    let source_id = payload.pointer("/source_id").and_then(Value::as_str).unwrap_or_default();
    let page = payload.pointer("/page").and_then(Value::as_u64).unwrap_or(1);
    let chunk_index = payload.pointer("/chunk_index").and_then(Value::as_u64).unwrap_or(0);

    Ok((
        Chunk::new(
            source_id,
            u32::try_from(page).unwrap_or(u32::MAX),
            u32::try_from(chunk_index).unwrap_or(u32::MAX),
            content,
        ),
        score.clamp(0.0, 1.0),
    ))
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        self.upsert_into(&self.alias, chunks, embeddings).await
    }

    async fn replace(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        let previous = self.aliased_collection().await?;
        let fresh = format!("{}-{}", self.alias, Uuid::new_v4().simple());

        self.create_collection(&fresh).await?;
        self.upsert_into(&fresh, chunks, embeddings).await?;

        let mut actions = Vec::new();
        if previous.is_some() {
            actions.push(json!({ "delete_alias": { "alias_name": self.alias } }));
        }
        actions.push(json!({
            "create_alias": { "collection_name": fresh, "alias_name": self.alias }
        }));

        let response = self
            .client
            .post(self.url("collections/aliases")?)
            .json(&json!({ "actions": actions }))
            .send()
            .await?;
        ensure_success(response.status())?;
        info!(collection = %fresh, points = chunks.len(), "qdrant alias switched");

        if let Some(old) = previous {
            let dropped = self
                .client
                .delete(self.url(&format!("collections/{old}"))?)
                .send()
                .await;
            if let Err(error) = dropped {
                warn!(collection = %old, %error, "failed to drop superseded collection");
            }
        }

        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>, StoreError> {
        self.check_dimensions(embedding)?;

        let response = self
            .client
            .post(self.url(&format!("collections/{}/points/search", self.alias))?)
            .json(&json!({
                "vector": embedding,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;
        ensure_success(response.status())?;

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "search response has no result array".to_string(),
            })?;

        hits.iter().map(parse_hit).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .client
            .post(self.url(&format!("collections/{}/points/count", self.alias))?)
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        ensure_success(response.status())?;

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "count response has no result.count".to_string(),
            })
    }
}
