use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{health::health, rag::answer_rag_query};

pub mod api_state;
pub mod error;
mod routes;

/// Router exposing the health probe and the RAG query endpoint.
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/health", get(health))
        .route("/rag", post(answer_rag_query))
}
