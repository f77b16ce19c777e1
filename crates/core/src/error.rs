use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding failed during ingestion: {0}")]
    Embedding(#[from] ModelError),

    #[error("index write failed: {0}")]
    Index(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {provider}: {details}")]
    BadResponse { provider: String, details: String },

    #[error("model returned no content")]
    EmptyResponse,
}

/// Failures of a single query cycle. Running out of relevant passages is not
/// among them: that yields the no-answer sentinel with zero confidence.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("query cannot be empty")]
    EmptyInput,

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] CollaboratorFailure),

    #[error("generation failed: {0}")]
    Generation(#[source] CollaboratorFailure),

    #[error("pipeline not ready: {0}")]
    NotReady(String),
}

#[derive(Debug, Error)]
pub enum CollaboratorFailure {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl PipelineError {
    /// Retrieval failure, lifting an index `NotReady` into the pipeline's own
    /// not-ready state so callers can report it as unavailable.
    pub fn from_retrieval(cause: CollaboratorFailure) -> Self {
        match cause {
            CollaboratorFailure::Store(StoreError::NotReady(details)) => Self::NotReady(details),
            other => Self::Retrieval(other),
        }
    }
}
