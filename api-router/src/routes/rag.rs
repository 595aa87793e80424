use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rag_pipeline::{QueryOutcome, DEFAULT_TOP_N};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RagRequest {
    pub query: String,
    #[serde(default = "default_top_n")]
    pub top_n: i64,
}

fn default_top_n() -> i64 {
    DEFAULT_TOP_N as i64
}

#[derive(Debug, Serialize)]
pub struct RagResponse {
    pub query: String,
    pub generated_answer: String,
    pub source_chunks: Vec<SourceChunk>,
}

#[derive(Debug, Serialize)]
pub struct SourceChunk {
    pub rank: usize,
    pub text: String,
    pub score: f32,
}

impl From<QueryOutcome> for RagResponse {
    fn from(outcome: QueryOutcome) -> Self {
        let source_chunks = outcome
            .sources
            .into_iter()
            .map(|chunk| SourceChunk {
                rank: chunk.rank,
                text: chunk.text,
                score: chunk.relevance,
            })
            .collect();

        Self {
            query: outcome.query,
            generated_answer: outcome.answer,
            source_chunks,
        }
    }
}

/// Answers one query over the corpus. Input problems are rejected here,
/// before any pipeline step runs.
pub async fn answer_rag_query(
    State(state): State<ApiState>,
    Json(request): Json<RagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        query_chars = request.query.len(),
        top_n = request.top_n,
        "Received RAG query"
    );

    if request.query.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "query must not be empty".to_string(),
        ));
    }
    let top_n = usize::try_from(request.top_n)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            ApiError::ValidationError("top_n must be a positive integer".to_string())
        })?;

    let outcome = state.pipeline.answer_query(&request.query, top_n).await?;

    Ok((StatusCode::OK, Json(RagResponse::from(outcome))))
}
