//! Shared settings: flags with environment fallbacks.

use crate::embed::{Embedder, GeminiEmbedder, ZeroEmbedder};
use crate::enrich::{GeminiClient, LlmClient};
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const EMBEDDING_DIMENSION: usize = 768;
pub const DEFAULT_LANGUAGE: &str = "matlab";
pub const SOURCE_ID: &str = "github.com/pulseq/pulseq";
pub const LIBRARY_VERSION: &str = "1.5.0";
pub const DEFAULT_OUTPUT_DIR: &str = "output/full_processing";

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// SQLite database holding the API reference
    #[arg(long, env = "APIREF_DB", default_value = "apiref.db", global = true)]
    pub db: PathBuf,

    /// API key for enrichment and embeddings; offline collaborators are used without one
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the generative language API
    #[arg(long, env = "APIREF_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    pub api_base: String,

    #[arg(long, env = "APIREF_LLM_MODEL", default_value = DEFAULT_LLM_MODEL, global = true)]
    pub llm_model: String,

    #[arg(long, env = "APIREF_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    pub embedding_model: String,

    /// Language key of stored rows
    #[arg(long, default_value = DEFAULT_LANGUAGE, global = true)]
    pub language: String,

    /// Library version recorded on stored rows
    #[arg(long, default_value = LIBRARY_VERSION, global = true)]
    pub library_version: String,
}

impl Settings {
    /// The API key, unless `offline` or empty.
    fn key(&self, offline: bool) -> Option<&str> {
        if offline {
            return None;
        }
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// LLM client, or `None` when running offline.
    pub fn llm(&self, offline: bool) -> Option<Box<dyn LlmClient>> {
        let key = self.key(offline)?;
        Some(Box::new(GeminiClient::new(&self.api_base, &self.llm_model, key)))
    }

    /// Embedding client; zero vectors when running offline.
    pub fn embedder(&self, offline: bool) -> Box<dyn Embedder> {
        match self.key(offline) {
            Some(key) => Box::new(GeminiEmbedder::new(
                &self.api_base,
                &self.embedding_model,
                key,
                EMBEDDING_DIMENSION,
            )),
            None => Box::new(ZeroEmbedder::new(EMBEDDING_DIMENSION)),
        }
    }

    /// Embedding client backed by the API; errors without a key.
    pub fn remote_embedder(&self) -> anyhow::Result<Box<dyn Embedder>> {
        let key = self
            .key(false)
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_API_KEY (or --api-key) is required"))?;
        Ok(Box::new(GeminiEmbedder::new(
            &self.api_base,
            &self.embedding_model,
            key,
            EMBEDDING_DIMENSION,
        )))
    }
}
