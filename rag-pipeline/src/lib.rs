pub mod context;
pub mod generation;
pub mod index;
pub mod reranking;
pub mod scoring;

use std::sync::Arc;

use common::{error::AppError, utils::embedding::EmbeddingProvider};
use generation::Generator;
use index::IndexStore;
use reranking::Reranker;
use tracing::{info, instrument};

/// Reranked chunks returned to the caller when the request does not say.
pub const DEFAULT_TOP_N: usize = 3;

/// A corpus chunk surfaced by similarity retrieval.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// A chunk the reranker selected, with its service-assigned relevance and a
/// 1-based rank reflecting the returned order.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub index: usize,
    pub text: String,
    pub relevance: f32,
    pub rank: usize,
}

/// Everything needed to render an answer with its supporting sources.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: String,
    pub answer: String,
    pub sources: Vec<RankedChunk>,
}

/// Owns the index store and the external capabilities. Constructed once at
/// process start and shared behind the router state; requests borrow it.
pub struct RagPipeline {
    index: IndexStore,
    embedder: Arc<EmbeddingProvider>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn Generator>,
}

impl RagPipeline {
    pub fn new(
        index: IndexStore,
        embedder: Arc<EmbeddingProvider>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            index,
            embedder,
            reranker,
            generator,
        }
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Runs one query through retrieval, reranking, and generation. The
    /// first failing step aborts the request; nothing is retried.
    #[instrument(skip_all)]
    pub async fn answer_query(
        &self,
        query: &str,
        top_n: usize,
    ) -> Result<QueryOutcome, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("query must not be empty".to_string()));
        }
        if top_n == 0 {
            return Err(AppError::Validation("top_n must be at least 1".to_string()));
        }

        let index = self.index.ensure_ready().await?;
        let query_vector = self.embedder.embed(query).await?;
        let shortlist = index.retrieve(&query_vector)?;
        info!(candidates = shortlist.len(), top_n, "Retrieved shortlist");

        let sources =
            reranking::rerank_shortlist(self.reranker.as_ref(), query, &shortlist, top_n).await?;

        let context = context::assemble_context(&sources);
        let prompt = generation::build_prompt(&context, query);
        let answer = self.generator.generate(&prompt).await?;
        info!(
            sources = sources.len(),
            answer_chars = answer.len(),
            "Generated answer"
        );

        Ok(QueryOutcome {
            query: query.to_owned(),
            answer,
            sources,
        })
    }
}
