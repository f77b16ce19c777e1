pub mod chunking;
pub mod confidence;
pub mod content_filter;
pub mod embeddings;
pub mod error;
pub mod evaluate;
pub mod extractor;
pub mod gemini;
pub mod ingest;
pub mod language;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_document, chunk_page, ChunkedDocument, ChunkingConfig};
pub use confidence::{is_no_answer, no_answer_sentinel, ConfidencePolicy};
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{CollaboratorFailure, IngestError, ModelError, PipelineError, StoreError};
pub use evaluate::{default_cases, EvalCase, EvaluationReport, Evaluator};
pub use gemini::{GeminiConfig, GeminiEmbedder, GeminiGenerator, GEMINI_EMBEDDING_DIMENSIONS};
pub use ingest::{collect_chunks, discover_source_files, ingest_folder, IngestionReport};
pub use memory::{ConversationMemory, SessionStore};
pub use models::{
    Chunk, Exchange, IngestionOptions, Language, LanguagePreference, PageText, QueryResult,
    RetrievedPassage, SourceDocument,
};
pub use normalize::{normalize, normalize_document};
pub use orchestrator::{PipelineConfig, QueryPipeline, QueryStage};
pub use retrieval::{Retrieval, RetrievalConfig, Retriever};
pub use stores::{LocalVectorStore, QdrantStore};
pub use traits::{Embedder, Generator, VectorIndex};
