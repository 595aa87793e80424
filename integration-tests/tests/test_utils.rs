use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use common::{error::AppError, utils::embedding::EmbeddingProvider};
use rag_pipeline::{
    generation::{Generator, StaticGenerator},
    index::IndexStore,
    reranking::{PassthroughReranker, RerankHit, Reranker},
    RagPipeline,
};
use tempfile::TempDir;
use tower_http::{cors::CorsLayer, services::ServeDir};

pub const TEST_DIMENSION: usize = 128;

/// A reranker that always reports the external service as down.
pub struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _top_n: usize,
    ) -> Result<Vec<RerankHit>, AppError> {
        Err(AppError::Rerank(
            "rerank endpoint returned 503: service unavailable".to_owned(),
        ))
    }
}

/// Writes `chunks` as the corpus file in `dir` and returns its path.
pub async fn write_corpus(dir: &TempDir, chunks: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join("chunks.json");
    let encoded = serde_json::to_string(chunks).expect("encode corpus");
    tokio::fs::write(&path, encoded).await.expect("write corpus");
    path
}

/// Assembles the full service router the way the binary does: API routes,
/// static file fallback, permissive CORS. Collaborators are substituted so
/// the tests run without network access.
pub fn build_app(
    dir: &TempDir,
    corpus_path: &std::path::Path,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn Generator>,
) -> Router {
    let provider = Arc::new(
        EmbeddingProvider::new_hashed(TEST_DIMENSION).expect("hashed embedding provider"),
    );
    let index = IndexStore::new(
        corpus_path,
        dir.path().join("embeddings.json"),
        Arc::clone(&provider),
    );
    let pipeline = Arc::new(RagPipeline::new(index, provider, reranker, generator));

    Router::new()
        .merge(api_routes())
        .fallback_service(ServeDir::new(dir.path().join("static")))
        .layer(CorsLayer::permissive())
        .with_state(ApiState::new(pipeline))
}

/// A router over `chunks` with the passthrough reranker and a canned answer.
pub async fn stub_app(dir: &TempDir, chunks: &[&str], answer: &str) -> Router {
    let corpus_path = write_corpus(dir, chunks).await;
    build_app(
        dir,
        &corpus_path,
        Arc::new(PassthroughReranker),
        Arc::new(StaticGenerator {
            reply: answer.to_owned(),
        }),
    )
}

pub fn rag_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/rag")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .expect("request")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("body is JSON")
}
