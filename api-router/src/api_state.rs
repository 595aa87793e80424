use std::sync::Arc;

use rag_pipeline::RagPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<RagPipeline>,
}

impl ApiState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }
}
