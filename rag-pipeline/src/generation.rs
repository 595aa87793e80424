use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};

/// Builds the prompt the generator answers from: the assembled context,
/// the user's question, and an answer cue.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!("Context: {context}\n\nQuestion: {query}\n\nAnswer:")
}

/// External text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// Answers through an OpenAI-compatible chat completion endpoint with a
/// fixed model and output budget.
pub struct ChatGenerator {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    max_tokens: u32,
}

impl ChatGenerator {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: &str, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_owned(),
            max_tokens,
        }
    }

    pub fn from_config(client: Arc<Client<OpenAIConfig>>, config: &AppConfig) -> Self {
        Self::new(client, &config.generation_model, config.generation_max_tokens)
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .max_tokens(self.max_tokens)
            .messages([ChatCompletionRequestUserMessage::from(prompt).into()])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or(AppError::LLMParsing(
                "No content found in LLM response".into(),
            ))?;

        Ok(content.trim().to_owned())
    }
}

/// Returns a canned reply so the pipeline can run without a live LLM.
#[cfg(any(test, feature = "test-utils"))]
pub struct StaticGenerator {
    pub reply: String,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Generator for StaticGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
        Ok(self.reply.trim().to_owned())
    }
}
