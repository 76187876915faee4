//! LLM integration for Quill.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and the OpenAI
//! implementation used by the article agent, plus [`ensure_llm_ready`] to build
//! a client from an [`LlmConfig`].
//!
//! # Examples
//! ```no_run
//! use quill_common::Result;
//! use quill_llm::{ensure_llm_ready, LlmConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::OpenAi {
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!     model: "gpt-4.1".into(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert_eq!(client.model_name(), "gpt-4.1");
//! # Ok(())
//! # }
//! ```
pub mod openai;
pub mod traits;

use openai::OpenAiClient;
use std::sync::Arc;
use traits::LlmClient;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// Which provider to talk to and how.
#[derive(Debug, Clone)]
pub enum LlmConfig {
    OpenAi {
        api_key: String,
        model: String,
        base_url: Option<String>,
    },
}

/// Build an LLM client for `config`.
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> quill_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    match config {
        LlmConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let client = match base_url {
                Some(url) => OpenAiClient::with_base_url(url, api_key.clone(), model.clone())?,
                None => OpenAiClient::new(api_key.clone(), model.clone())?,
            };
            tracing::info!(model = %model, "llm.client.ready");
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn base_url_override_builds_a_client() {
        let cfg = LlmConfig::OpenAi {
            api_key: "sk-test".into(),
            model: "gpt-4.1-mini".into(),
            base_url: Some("http://127.0.0.1:9/v1".into()),
        };
        let client = ensure_llm_ready(&cfg).await.unwrap();
        assert_eq!(client.model_name(), "gpt-4.1-mini");
    }

    #[tokio::test]
    async fn blank_key_is_a_config_error() {
        let cfg = LlmConfig::OpenAi {
            api_key: "  ".into(),
            model: DEFAULT_OPENAI_MODEL.into(),
            base_url: None,
        };
        let err = ensure_llm_ready(&cfg).await.err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
