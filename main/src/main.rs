use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::utils::{config::get_config, embedding::EmbeddingProvider};
use rag_pipeline::{
    generation::ChatGenerator, index::IndexStore, reranking::HttpReranker, RagPipeline,
};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(openai_client.clone())).await?);
    info!(
        embedding_backend = ?config.embedding_backend,
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    // Assemble the pipeline. The corpus index is built lazily by the first
    // /rag request; only /health is served before that.
    let index = IndexStore::new(
        &config.corpus_path,
        &config.embeddings_path,
        embedding_provider.clone(),
    );
    let reranker = Arc::new(HttpReranker::from_config(&config));
    let generator = Arc::new(ChatGenerator::from_config(openai_client, &config));
    let pipeline = Arc::new(RagPipeline::new(
        index,
        embedding_provider,
        reranker,
        generator,
    ));

    let app = build_router(ApiState::new(pipeline), &config.static_dir);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// API routes first, then the static directory for everything else, with a
/// permissive CORS layer over the lot.
fn build_router(api_state: ApiState, static_dir: &str) -> Router {
    Router::new()
        .merge(api_routes())
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(api_state)
}
