use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use quill_common::{QuillError, Result};
use quill_http::{HttpClient, HttpError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

/// Agent turns can produce a full article; give them room.
const OPENAI_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_INSTRUCTIONS: &str = "You are a careful writer who relies only on supplied sources.";

pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ResponsesApiRequest<'a> {
    model: &'a str,
    input: &'a str,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponsesApiResponse {
    #[serde(default)]
    status: Option<String>,
    model: String,
    #[serde(default)]
    output: Vec<ResponseMessage>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    #[serde(default)]
    reason: Option<String>,
}

impl OpenAiClient {
    /// Create a client against the public OpenAI endpoint.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(OPENAI_API_BASE, api_key, model)
    }

    /// Create a client against an OpenAI-compatible endpoint (gateway, proxy, mock server).
    ///
    /// ```
    /// use quill_llm::openai::OpenAiClient;
    /// use quill_llm::traits::LlmClient;
    ///
    /// let client = OpenAiClient::with_base_url(
    ///     "http://localhost:8080/v1",
    ///     "sk-test".into(),
    ///     "gpt-4.1".into(),
    /// )
    /// .unwrap();
    /// assert_eq!(client.model_name(), "gpt-4.1");
    /// ```
    pub fn with_base_url(base_url: &str, api_key: String, model: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(QuillError::Config("OPENAI_API_KEY is not set".to_string()));
        }
        let client = HttpClient::new(base_url)
            .map_err(|e| QuillError::Config(format!("OpenAI client init failed: {e}")))?
            .with_timeout(OPENAI_TIMEOUT);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let req = ResponsesApiRequest {
            model: &self.model,
            input: prompt,
            instructions: system_prompt.unwrap_or(DEFAULT_INSTRUCTIONS),
            temperature,
            max_output_tokens: max_tokens,
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            ?max_tokens,
            ?temperature,
            "openai.generate.start"
        );

        let resp: ResponsesApiResponse = self
            .client
            .post_json("responses", Some(&self.api_key), &req)
            .await
            .map_err(http_to_quill)?;

        let text: String = resp
            .output
            .iter()
            .filter(|msg| msg.kind == "message")
            .flat_map(|msg| &msg.content)
            .filter(|c| c.kind == "output_text")
            .map(|c| c.text.as_str())
            .collect();

        if resp.status.as_deref() == Some("incomplete") {
            let reason = resp
                .incomplete_details
                .and_then(|d| d.reason)
                .unwrap_or_else(|| "unknown".to_string());
            tracing::warn!(model = %resp.model, %reason, "openai.generate.incomplete");
            if text.trim().is_empty() {
                return Err(QuillError::Llm(format!(
                    "response incomplete ({reason}) with no text"
                )));
            }
        }

        if text.trim().is_empty() {
            return Err(QuillError::Llm("model returned an empty response".into()));
        }

        let tokens_used = resp.usage.and_then(|u| u.total_tokens);
        tracing::debug!(model = %resp.model, ?tokens_used, text_chars = text.len(), "openai.generate.done");

        Ok(LlmResponse {
            text,
            model: Some(resp.model),
            tokens_used,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .generate("Respond with just 'OK'", None, Some(16), None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "openai.health_check.failed");
                Ok(false)
            }
        }
    }
}

fn http_to_quill(e: HttpError) -> QuillError {
    QuillError::Llm(format!("{e}"))
}
