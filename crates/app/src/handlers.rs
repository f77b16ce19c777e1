use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use sahitya_rag_core::{Language, LanguagePreference, PipelineError, QueryResult};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::server::AppState;

/// Session used when a request does not name one.
pub(crate) const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub language: LanguagePreference,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMetadata {
    pub detected_language: Language,
    pub num_sources: usize,
    pub source_pages: Vec<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatResponse {
    pub answer: String,
    pub context_chunks: Vec<String>,
    pub confidence_score: f32,
    pub metadata: ChatMetadata,
}

impl From<QueryResult> for ChatResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            context_chunks: result.context_chunks(),
            metadata: ChatMetadata {
                detected_language: result.detected_language,
                num_sources: result.num_sources(),
                source_pages: result.source_pages,
                timestamp: result.completed_at,
            },
            answer: result.answer,
            confidence_score: result.confidence,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Maps pipeline failures onto status codes. Collaborator details stay in the
/// log; clients only see a generic message for 500s.
pub(crate) struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            PipelineError::EmptyInput => (StatusCode::BAD_REQUEST, "Query cannot be empty".to_string()),
            PipelineError::NotReady(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Index not available. Run ingestion first.".to_string(),
            ),
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error processing query".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = request
        .session_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(DEFAULT_SESSION);

    let result = state
        .pipeline
        .ask(session_id, &request.query, request.language)
        .await?;
    Ok(Json(ChatResponse::from(result)))
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = match state.pipeline.indexed_chunks().await {
        Ok(count) if count > 0 => "healthy",
        _ => "degraded",
    };
    Json(RootResponse {
        message: "Multilingual RAG System API",
        status,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct Components {
    vector_store: &'static str,
    llm: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_secs: u64,
    components: Components,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexed_chunks: Option<usize>,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let indexed = state.pipeline.indexed_chunks().await;
    let healthy = matches!(indexed, Ok(count) if count > 0);
    Json(HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        timestamp: Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        components: Components {
            vector_store: if healthy { "ok" } else { "error" },
            llm: "ok",
        },
        indexed_chunks: indexed.ok(),
    })
}

#[derive(Serialize)]
pub(crate) struct StatsResponse {
    total_chunks: usize,
    sessions: usize,
    max_sessions: usize,
    memory_history_length: usize,
    last_query_time: Option<DateTime<Utc>>,
}

pub(crate) async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let total_chunks = state.pipeline.indexed_chunks().await?;
    let sessions = state.pipeline.sessions();

    let (memory_history_length, last_query_time) = match sessions.existing(DEFAULT_SESSION).await {
        Some(handle) => {
            let memory = handle.lock().await;
            (memory.len(), memory.last_exchange().map(|exchange| exchange.timestamp))
        }
        None => (0, None),
    };

    Ok(Json(StatsResponse {
        total_chunks,
        sessions: sessions.session_count().await,
        max_sessions: sessions.capacity().await,
        memory_history_length,
        last_query_time,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults_language_and_session() {
        let request: ChatRequest = serde_json::from_str(r#"{"query":"কে?"}"#).unwrap();
        assert_eq!(request.language, LanguagePreference::Auto);
        assert!(request.session_id.is_none());

        let request: ChatRequest =
            serde_json::from_str(r#"{"query":"who?","language":"en","session_id":"s1"}"#).unwrap();
        assert_eq!(request.language, LanguagePreference::Other);
        assert_eq!(request.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn internal_errors_are_redacted() {
        let error = ApiError(PipelineError::Configuration("api key sk-secret rejected".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_ready_is_service_unavailable() {
        let response = ApiError(PipelineError::NotReady("missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
