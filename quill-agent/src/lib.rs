//! Tool-using agent that turns a keyword into an HTML article.
//!
//! - [`tools`]: the [`Tool`](tools::Tool) trait, a registry, and the search
//!   and scrape tools backed by `quill-web`
//! - [`react`]: a bounded Thought / Action / Observation loop over any
//!   [`LlmClient`](quill_llm::traits::LlmClient)
//! - [`article`]: the article prompt and the orchestrator that runs it
pub mod article;
pub mod react;
pub mod tools;

pub use article::{ArticleGenerator, GeneratorSettings};
pub use react::{AgentOutcome, AgentStep, ReActAgent};
pub use tools::{ScrapeTool, SearchTool, Tool, ToolRegistry};
