mod handlers;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sahitya_rag_core::{
    default_cases, ingest_folder, CharacterNgramEmbedder, ConfidencePolicy, EvalCase, Evaluator,
    Embedder, GeminiConfig, GeminiEmbedder, GeminiGenerator, Generator, IngestionOptions,
    LanguagePreference, LocalVectorStore, PipelineConfig, PipelineError, QdrantStore,
    QueryPipeline, RetrievalConfig, VectorIndex,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::handlers::ChatResponse;

#[derive(Parser)]
#[command(name = "sahitya-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the Gemini embedding and generation models
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Directory of the local vector index
    #[arg(long, env = "VECTOR_INDEX_PATH", default_value = "./vector_index")]
    index_path: PathBuf,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Gemini)]
    embedder: EmbedderKind,

    /// Vector index backend
    #[arg(long, value_enum, default_value_t = IndexKind::Local)]
    index: IndexKind,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant alias that queries go through
    #[arg(long, default_value = "sahitya_chunks")]
    qdrant_collection: String,

    /// Seconds allowed for query embedding and index lookup
    #[arg(long, default_value = "20")]
    retrieval_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Gemini,
    Ngram,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexKind {
    Local,
    Qdrant,
}

#[derive(Clone, Copy, ValueEnum)]
enum LanguageArg {
    Auto,
    #[value(alias = "bn")]
    Primary,
    #[value(alias = "en")]
    Other,
}

impl From<LanguageArg> for LanguagePreference {
    fn from(value: LanguageArg) -> Self {
        match value {
            LanguageArg::Auto => LanguagePreference::Auto,
            LanguageArg::Primary => LanguagePreference::Primary,
            LanguageArg::Other => LanguagePreference::Other,
        }
    }
}

#[derive(Args)]
struct QueryArgs {
    /// Passages retrieved per question
    #[arg(long, default_value = "5")]
    top_k: usize,

    /// Minimum similarity for a passage to be used
    #[arg(long, default_value = "0.6")]
    score_threshold: f32,

    /// Exchanges remembered per session
    #[arg(long, default_value = "5")]
    max_history: usize,

    /// Sessions kept in memory before the least recently used is dropped
    #[arg(long, env = "MAX_SESSIONS", default_value = "1024")]
    max_sessions: usize,

    /// Seconds allowed for answer generation
    #[arg(long, default_value = "60")]
    generation_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index every pdf, txt and md file in a folder.
    Ingest {
        /// Folder that contains the source documents, searched recursively.
        #[arg(long, env = "DOCUMENTS_PATH", default_value = "./documents")]
        documents: PathBuf,
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        #[arg(long, default_value = "100")]
        chunk_overlap: usize,
        #[arg(long, default_value = "30")]
        min_chunk_chars: usize,
        /// Pages shorter than this are skipped.
        #[arg(long, default_value = "50")]
        min_page_chars: usize,
        /// Index multiple-choice question pages too.
        #[arg(long, default_value_t = false)]
        keep_question_pages: bool,
        #[arg(long, default_value = "64")]
        embed_batch_size: usize,
    },
    /// Answer one question and print the response as JSON.
    Ask {
        #[arg(long)]
        query: String,
        #[arg(long, value_enum, default_value_t = LanguageArg::Auto)]
        language: LanguageArg,
        #[arg(long, default_value = "default")]
        session: String,
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Serve the chat API over HTTP.
    Serve {
        #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, env = "PORT", default_value = "8000")]
        port: u16,
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Score retrieval against question and expected-answer pairs.
    Evaluate {
        /// JSON array of {"question", "expected_answer"}; the built-in set when omitted.
        #[arg(long)]
        cases: Option<PathBuf>,
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Where to write the full report as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn api_key(&self) -> anyhow::Result<&str> {
        match self.google_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!(PipelineError::Configuration(
                "GOOGLE_API_KEY is not set".to_string()
            )),
        }
    }

    fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        let embedder: Arc<dyn Embedder> = match self.embedder {
            EmbedderKind::Gemini => Arc::new(GeminiEmbedder::new(GeminiConfig::new(self.api_key()?))),
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        };
        Ok(embedder)
    }

    fn generator(&self) -> anyhow::Result<Arc<dyn Generator>> {
        Ok(Arc::new(GeminiGenerator::new(GeminiConfig::new(self.api_key()?))))
    }

    /// Opens the index for reading. A missing local index is an error here.
    async fn open_index(&self, dimensions: usize) -> anyhow::Result<Arc<dyn VectorIndex>> {
        let index: Arc<dyn VectorIndex> = match self.index {
            IndexKind::Local => Arc::new(LocalVectorStore::open(&self.index_path).await?),
            IndexKind::Qdrant => Arc::new(QdrantStore::new(
                &self.qdrant_url,
                self.qdrant_collection.clone(),
                dimensions,
            )?),
        };
        Ok(index)
    }

    async fn writable_index(&self, dimensions: usize) -> anyhow::Result<Arc<dyn VectorIndex>> {
        let index: Arc<dyn VectorIndex> = match self.index {
            IndexKind::Local => Arc::new(LocalVectorStore::create(&self.index_path).await?),
            IndexKind::Qdrant => Arc::new(QdrantStore::new(
                &self.qdrant_url,
                self.qdrant_collection.clone(),
                dimensions,
            )?),
        };
        Ok(index)
    }

    async fn pipeline(&self, options: &QueryArgs) -> anyhow::Result<QueryPipeline> {
        let embedder = self.embedder()?;
        let index = self.open_index(embedder.dimensions()).await?;
        let generator = self.generator()?;

        let config = PipelineConfig {
            retrieval: RetrievalConfig {
                top_k: options.top_k,
                score_threshold: options.score_threshold,
                timeout: self.retrieval_timeout(),
            },
            confidence: ConfidencePolicy::default(),
            generation_timeout: Duration::from_secs(options.generation_timeout_secs),
            max_history: options.max_history,
            max_sessions: options.max_sessions,
        };
        Ok(QueryPipeline::new(embedder, index, generator, config)?)
    }
}

async fn load_cases(path: Option<&Path>) -> anyhow::Result<Vec<EvalCase>> {
    let Some(path) = path else {
        return Ok(default_cases());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid cases file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "sahitya-rag boot"
    );

    match &cli.command {
        Command::Ingest {
            documents,
            chunk_size,
            chunk_overlap,
            min_chunk_chars,
            min_page_chars,
            keep_question_pages,
            embed_batch_size,
        } => {
            let options = IngestionOptions {
                chunk_max_chars: *chunk_size,
                chunk_overlap_chars: *chunk_overlap,
                min_chunk_chars: *min_chunk_chars,
                min_page_chars: *min_page_chars,
                filter_question_pages: !keep_question_pages,
                embed_batch_size: *embed_batch_size,
            };
            let embedder = cli.embedder()?;
            let index = cli.writable_index(embedder.dimensions()).await?;

            let report = ingest_folder(documents, &options, embedder.as_ref(), index.as_ref()).await?;
            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }

            println!(
                "{} chunks from {} file(s) indexed at {} ({} files skipped, {} pages filtered, {} pieces dropped)",
                report.chunks.len(),
                report.files.len(),
                Utc::now().to_rfc3339(),
                report.skipped_files.len(),
                report.skipped_pages.len(),
                report.dropped_chunks
            );
        }
        Command::Ask {
            query,
            language,
            session,
            options,
        } => {
            let pipeline = cli.pipeline(options).await?;
            let result = pipeline.ask(session, query, (*language).into()).await?;
            println!("{}", serde_json::to_string_pretty(&ChatResponse::from(result))?);
        }
        Command::Serve { bind, port, options } => {
            let pipeline = cli.pipeline(options).await?;
            let indexed = pipeline.indexed_chunks().await?;
            if indexed == 0 {
                bail!(PipelineError::Configuration(
                    "vector index is empty; run ingest first".to_string()
                ));
            }
            info!(indexed, "pipeline ready");
            server::serve(Arc::new(pipeline), bind, *port).await?;
        }
        Command::Evaluate {
            cases,
            top_k,
            output,
        } => {
            let cases = load_cases(cases.as_deref()).await?;
            let embedder = cli.embedder()?;
            let index = cli.open_index(embedder.dimensions()).await?;
            let evaluator = Evaluator::new(embedder, index, *top_k, cli.retrieval_timeout());
            let report = evaluator.evaluate(&cases).await?;

            println!("total cases: {}", report.total_cases);
            println!("average relevance: {:.3}", report.avg_relevance);
            println!("average groundedness: {:.3}", report.avg_groundedness);
            println!("exact match accuracy: {:.3}", report.exact_match_accuracy);
            for (position, case) in report.case_results.iter().enumerate() {
                println!(
                    "[{}] relevance={:.3} groundedness={:.3} exact={} docs={} question={}",
                    position + 1,
                    case.relevance_score,
                    case.groundedness_score,
                    case.exact_match,
                    case.retrieved_docs_count,
                    case.question
                );
            }

            if let Some(path) = output {
                tokio::fs::write(path, serde_json::to_vec_pretty(&report)?)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("report written to {}", path.display());
            }
        }
    }

    Ok(())
}
