use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub rerank_api_key: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,
    #[serde(default = "default_embeddings_path")]
    pub embeddings_path: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: String,
    #[serde(default)]
    pub fastembed_model: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_generation_max_tokens")]
    pub generation_max_tokens: u32,
    #[serde(default = "default_rerank_base_url")]
    pub rerank_base_url: String,
    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,
}

fn default_http_port() -> u16 {
    8002
}

fn default_corpus_path() -> String {
    "chunks.json".to_string()
}

fn default_embeddings_path() -> String {
    "embeddings.json".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_embedding_backend() -> String {
    "fastembed".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    384
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generation_max_tokens() -> u32 {
    200
}

fn default_rerank_base_url() -> String {
    "https://api.cohere.com/v2".to_string()
}

fn default_rerank_model() -> String {
    "rerank-english-v3.0".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            rerank_api_key: String::new(),
            http_port: default_http_port(),
            corpus_path: default_corpus_path(),
            embeddings_path: default_embeddings_path(),
            static_dir: default_static_dir(),
            embedding_backend: default_embedding_backend(),
            fastembed_model: None,
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            openai_base_url: default_base_url(),
            generation_model: default_generation_model(),
            generation_max_tokens: default_generation_max_tokens(),
            rerank_base_url: default_rerank_base_url(),
            rerank_model: default_rerank_model(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_local_corpus_files() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8002);
        assert_eq!(config.corpus_path, "chunks.json");
        assert_eq!(config.embeddings_path, "embeddings.json");
        assert_eq!(config.embedding_backend, "fastembed");
        assert_eq!(config.embedding_dimensions, 384);
        assert_eq!(config.generation_max_tokens, 200);
    }
}
