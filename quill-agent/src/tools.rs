use async_trait::async_trait;
use quill_common::{QuillError, Result};
use quill_web::{FirecrawlClient, SerperClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Something the agent can call by name with a JSON argument object.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn input_schema(&self) -> Value;

    /// Run the tool and return the observation text for the model.
    async fn call(&self, input: Value) -> Result<String>;
}

/// Tools available to one agent, in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        let name = name.trim();
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool catalogue as it appears in the system prompt.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| {
                format!(
                    "> Tool Name: {}\nTool Description: {}\nTool Args: {}\n",
                    t.name(),
                    t.description(),
                    t.input_schema()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    num_results: Option<u32>,
}

/// Compact view of a search hit handed back to the model.
#[derive(Debug, Serialize)]
struct SearchHit<'a> {
    title: &'a str,
    url: &'a str,
    snippet: &'a str,
}

/// Google search through Serper.
pub struct SearchTool {
    client: SerperClient,
}

impl SearchTool {
    pub fn new(client: SerperClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search Google for a query and return the top results as a JSON list of {title, url, snippet}."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query."},
                "num_results": {"type": "integer", "description": "How many results to return (default 5)."}
            },
            "required": ["query"]
        })
    }

    async fn call(&self, input: Value) -> Result<String> {
        let args: SearchArgs = parse_args(self.name(), input)?;
        let results = self.client.search(&args.query, args.num_results).await?;
        let hits: Vec<SearchHit<'_>> = results
            .iter()
            .map(|r| SearchHit {
                title: &r.title,
                url: &r.url,
                snippet: &r.snippet,
            })
            .collect();
        serde_json::to_string(&hits).map_err(|e| QuillError::Tool(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ScrapeArgs {
    url: String,
}

/// Main-content markdown of one page through Firecrawl.
pub struct ScrapeTool {
    client: FirecrawlClient,
}

impl ScrapeTool {
    pub fn new(client: FirecrawlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        "scrape"
    }

    fn description(&self) -> &str {
        "Scrape a web page and return its main content as markdown."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute http(s) URL of the page."}
            },
            "required": ["url"]
        })
    }

    async fn call(&self, input: Value) -> Result<String> {
        let args: ScrapeArgs = parse_args(self.name(), input)?;
        let page = self.client.scrape(&args.url).await?;
        if page.markdown.trim().is_empty() {
            tracing::warn!(url = %page.url, "tool.scrape.empty");
            return Ok(json!({"warning": "No markdown content found"}).to_string());
        }
        Ok(page.markdown)
    }
}

/// Decode tool arguments, accepting a bare `{"input": "..."}` for single-field tools.
fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    let input = match input {
        Value::Object(ref map) if map.len() == 1 && map.contains_key("input") => {
            let key = match tool {
                "search" => "query",
                "scrape" => "url",
                _ => "input",
            };
            json!({ key: map["input"].clone() })
        }
        other => other,
    };
    serde_json::from_value(input)
        .map_err(|e| QuillError::Tool(format!("invalid arguments for {tool}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "echo the input"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, input: Value) -> Result<String> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn registry_keeps_order_and_replaces_duplicates() {
        let reg = ToolRegistry::new()
            .with(Arc::new(Echo("b")))
            .with(Arc::new(Echo("a")))
            .with(Arc::new(Echo("b")));
        assert_eq!(reg.names(), vec!["b", "a"]);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(" a ").is_some());
        assert!(reg.get("c").is_none());
    }

    #[test]
    fn catalogue_lists_every_tool() {
        let reg = ToolRegistry::new()
            .with(Arc::new(Echo("search")))
            .with(Arc::new(Echo("scrape")));
        let text = reg.describe();
        assert!(text.contains("> Tool Name: search"));
        assert!(text.contains("> Tool Name: scrape"));
        assert!(text.contains("Tool Args: {\"type\":\"object\"}"));
    }

    #[test]
    fn bare_input_maps_to_the_primary_field() {
        let args: ScrapeArgs = parse_args("scrape", json!({"input": "https://a.example"})).unwrap();
        assert_eq!(args.url, "https://a.example");

        let args: SearchArgs = parse_args("search", json!({"query": "q", "num_results": 3})).unwrap();
        assert_eq!(args.num_results, Some(3));
    }

    #[test]
    fn missing_fields_are_tool_errors() {
        let err = parse_args::<ScrapeArgs>("scrape", json!({"link": "x"})).unwrap_err();
        assert!(matches!(err, QuillError::Tool(_)));
        assert!(err.to_string().contains("scrape"));
    }
}
