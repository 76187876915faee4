//! Common types shared across the Quill crates.
//!
//! This crate holds the small data model that flows between the web clients,
//! the agent and the UI, plus the shared error type and the tracing setup in
//! [`observability`]. It stays dependency-light so every crate can use it.
//!
//! # Overview
//!
//! - [`Keyword`]: validated user topic
//! - [`SearchResult`] and [`ScrapedPage`]: tool payloads
//! - [`GeneratedArticle`]: the result shown to the user
//! - [`QuillError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use quill_common::Keyword;
//!
//! let kw = Keyword::parse("  future of solar power ").unwrap();
//! assert_eq!(kw.as_str(), "future of solar power");
//! assert!(Keyword::parse("   ").is_err());
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod observability;

/// A non-empty, trimmed topic supplied by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Keyword(String);

impl Keyword {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuillError::InvalidKeyword(
                "keyword must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Keyword {
    type Error = QuillError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<Keyword> for String {
    fn from(kw: Keyword) -> Self {
        kw.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One organic hit returned by the search API, in ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based rank reported by the provider.
    pub position: u32,
}

/// Main content of a single page, as markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
    /// Set when `markdown` was cut to the configured character cap.
    pub truncated: bool,
}

/// Final HTML article for one keyword.
#[derive(Debug, Clone)]
pub struct GeneratedArticle {
    pub keyword: Keyword,
    pub html: String,
    /// Number of agent iterations it took to reach the answer.
    pub steps: usize,
    pub elapsed: Duration,
}

/// Error types used across the Quill crates.
#[derive(thiserror::Error, Debug)]
pub enum QuillError {
    /// The user-supplied keyword was rejected.
    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),

    /// The language model call failed or returned something unusable.
    #[error("LLM error: {0}")]
    Llm(String),

    /// A search or scrape call failed.
    #[error("Tool error: {0}")]
    Tool(String),

    /// The agent loop failed for a reason other than the model or a tool.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The agent used its whole iteration budget without answering.
    #[error("Agent reached the maximum of {0} iterations without an answer")]
    MaxIterations(usize),

    /// Configuration was incomplete or invalid (for example a missing API key).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`QuillError`].
pub type Result<T> = std::result::Result<T, QuillError>;
