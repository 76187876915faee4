//! Minimal client for the Serper Google search API.
use quill_common::{QuillError, Result, SearchResult};
use quill_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const SERPER_API_BASE: &str = "https://google.serper.dev";
pub const DEFAULT_NUM_RESULTS: u32 = 5;
const SERPER_TIMEOUT: Duration = Duration::from_secs(30);
/// Serper rejects `num` above 100.
const MAX_NUM_RESULTS: u32 = 100;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<u32>,
}

#[derive(Clone)]
pub struct SerperClient {
    http: HttpClient,
    api_key: String,
    num_results: u32,
}

impl SerperClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(SERPER_API_BASE, api_key)
    }

    /// Point the client at another host, e.g. a mock server in tests.
    pub fn with_base_url(base_url: &str, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(QuillError::Config("SERPER_API_KEY is not set".into()));
        }
        let http = HttpClient::new(base_url)
            .map_err(|e| QuillError::Config(format!("Serper client init failed: {e}")))?
            .with_timeout(SERPER_TIMEOUT);
        Ok(Self {
            http,
            api_key,
            num_results: DEFAULT_NUM_RESULTS,
        })
    }

    /// Default result count used when the caller does not ask for one.
    pub fn with_num_results(mut self, n: u32) -> Self {
        self.num_results = n.clamp(1, MAX_NUM_RESULTS);
        self
    }

    pub fn num_results(&self) -> u32 {
        self.num_results
    }

    /// Run one search and return organic hits in ranking order.
    pub async fn search(&self, query: &str, num_results: Option<u32>) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QuillError::Tool("search query must not be empty".into()));
        }
        let num = num_results
            .unwrap_or(self.num_results)
            .clamp(1, MAX_NUM_RESULTS);

        let started = Instant::now();
        tracing::info!(target: "web.serper", query = %query, num, "serper.search.start");

        let auth = Auth::api_key_header("x-api-key", &self.api_key)
            .map_err(|e| QuillError::Config(format!("invalid SERPER_API_KEY: {e}")))?;
        let resp: SearchResponse = self
            .http
            .post_json_opts(
                "search",
                &SearchRequest { q: query, num },
                RequestOpts {
                    auth: Some(auth),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                tracing::warn!(
                    target: "web.serper",
                    query = %query,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "serper.search.error"
                );
                QuillError::Tool(format!("search failed: {e}"))
            })?;

        let results = collect_results(resp);
        tracing::info!(
            target: "web.serper",
            query = %query,
            hit_count = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "serper.search.success"
        );
        Ok(results)
    }
}

fn collect_results(resp: SearchResponse) -> Vec<SearchResult> {
    resp.organic
        .into_iter()
        .filter(|r| !r.link.trim().is_empty())
        .enumerate()
        .map(|(idx, r)| SearchResult {
            title: r.title,
            url: r.link,
            snippet: r.snippet,
            position: r.position.unwrap_or(idx as u32 + 1),
        })
        .collect()
}
