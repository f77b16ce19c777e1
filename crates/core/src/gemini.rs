//! Google Generative Language API clients for embeddings and answers.

use crate::traits::{Embedder, Generator};
use crate::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";
pub const GEMINI_EMBEDDING_DIMENSIONS: usize = 768;

const PROVIDER: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub temperature: f32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: 0.3,
        }
    }

    fn method_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.endpoint.trim_end_matches('/'),
            model,
            method
        )
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

pub struct GeminiEmbedder {
    config: GeminiConfig,
    client: Client,
}

impl GeminiEmbedder {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn request<'a>(&self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: format!("models/{}", self.config.embedding_model),
            content: Content {
                parts: vec![Part { text }],
            },
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<Value, ModelError> {
        let response = self
            .client
            .post(self.config.method_url(&self.config.embedding_model, method))
            .query(&[("key", self.config.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::BadResponse {
                provider: PROVIDER.to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn dimensions(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let payload = self.post("embedContent", &self.request(text)).await?;
        let parsed: EmbedResponse =
            serde_json::from_value(payload).map_err(|error| ModelError::BadResponse {
                provider: PROVIDER.to_string(),
                details: error.to_string(),
            })?;
        if parsed.embedding.values.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(parsed.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = BatchEmbedRequest {
            requests: texts.iter().map(|text| self.request(text)).collect(),
        };
        let payload = self.post("batchEmbedContents", &body).await?;
        let parsed: BatchEmbedResponse =
            serde_json::from_value(payload).map_err(|error| ModelError::BadResponse {
                provider: PROVIDER.to_string(),
                details: error.to_string(),
            })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(ModelError::BadResponse {
                provider: PROVIDER.to_string(),
                details: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            });
        }

        Ok(parsed.embeddings.into_iter().map(|item| item.values).collect())
    }
}

pub struct GeminiGenerator {
    config: GeminiConfig,
    client: Client,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self
            .client
            .post(
                self.config
                    .method_url(&self.config.generation_model, "generateContent"),
            )
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                "generationConfig": { "temperature": self.config.temperature },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::BadResponse {
                provider: PROVIDER.to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        let text = extract_candidate_text(&payload).ok_or(ModelError::EmptyResponse)?;
        Ok(text)
    }
}

fn extract_candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_parts_are_joined() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "অনুপমের " }, { "text": "মামা। " }] }
            }]
        });
        assert_eq!(extract_candidate_text(&payload).as_deref(), Some("অনুপমের মামা।"));
    }

    #[test]
    fn blocked_or_empty_candidates_yield_nothing() {
        assert!(extract_candidate_text(&json!({ "candidates": [] })).is_none());
        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert!(extract_candidate_text(&blank).is_none());
    }

    #[test]
    fn method_url_tolerates_trailing_slash() {
        let mut config = GeminiConfig::new("key");
        config.endpoint = "http://localhost:9000/v1beta/".to_string();
        assert_eq!(
            config.method_url("text-embedding-004", "embedContent"),
            "http://localhost:9000/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn batch_request_names_the_model() -> Result<(), Box<dyn std::error::Error>> {
        let embedder = GeminiEmbedder::new(GeminiConfig::new("key"));
        let body = BatchEmbedRequest {
            requests: vec![embedder.request("কল্যাণী")],
        };
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(value["requests"][0]["content"]["parts"][0]["text"], "কল্যাণী");
        Ok(())
    }
}
