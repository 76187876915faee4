//! Firecrawl scrape client.
//!
//! Only the single-page `/v1/scrape` endpoint is used. Pages come back as
//! markdown restricted to the main content, with boilerplate tags stripped
//! server-side.
use quill_common::{QuillError, Result, ScrapedPage};
use quill_http::{HttpClient, HttpError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use url::Url;

pub const FIRECRAWL_API_BASE: &str = "https://api.firecrawl.dev/";
pub const DEFAULT_MAX_CHARS: usize = 10_000;
pub const TRUNCATION_SUFFIX: &str = "... (truncated)";
/// JS-heavy pages plus `waitFor` easily pass the default timeout.
const FIRECRAWL_TIMEOUT: Duration = Duration::from_secs(60);

/// Request knobs sent with every scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOptions {
    pub formats: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub only_main_content: bool,
    pub wait_for_ms: u64,
    /// Markdown longer than this many characters is cut and suffixed.
    pub max_chars: usize,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec!["markdown".into()],
            exclude_tags: ["script", "style", "svg", "iframe", "footer", "nav", "header"]
                .into_iter()
                .map(String::from)
                .collect(),
            only_main_content: true,
            wait_for_ms: 1000,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [String],
    exclude_tags: &'a [String],
    only_main_content: bool,
    wait_for: u64,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<PageMetadata>,
}

#[derive(Debug, Deserialize)]
struct PageMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "sourceURL", default)]
    source_url: Option<String>,
}

#[derive(Clone)]
pub struct FirecrawlClient {
    http: HttpClient,
    api_key: String,
    options: ScrapeOptions,
}

impl FirecrawlClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(FIRECRAWL_API_BASE, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(QuillError::Config("FIRECRAWL_API_KEY is not set".into()));
        }
        let http = HttpClient::new(base_url)
            .map_err(|e| QuillError::Config(format!("Firecrawl client init failed: {e}")))?
            .with_timeout(FIRECRAWL_TIMEOUT);
        Ok(Self {
            http,
            api_key,
            options: ScrapeOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ScrapeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Scrape one page and return its main content as markdown.
    ///
    /// Pages with no markdown still succeed with an empty body.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        let target = validate_url(url)?;
        let started = Instant::now();
        tracing::info!(target: "web.firecrawl", url = %target, "firecrawl.scrape.start");

        let req = ScrapeRequest {
            url: target.as_str(),
            formats: &self.options.formats,
            exclude_tags: &self.options.exclude_tags,
            only_main_content: self.options.only_main_content,
            wait_for: self.options.wait_for_ms,
        };

        let resp: ScrapeResponse = self
            .http
            .post_json("v1/scrape", Some(&self.api_key), &req)
            .await
            .map_err(|e| scrape_error(&target, started, e))?;

        if !resp.success {
            let msg = resp.error.unwrap_or_else(|| "scrape was not successful".into());
            tracing::warn!(target: "web.firecrawl", url = %target, error = %msg, "firecrawl.scrape.rejected");
            return Err(QuillError::Tool(format!("scrape of {target} failed: {msg}")));
        }

        let (markdown, metadata) = match resp.data {
            Some(data) => (data.markdown.unwrap_or_default(), data.metadata),
            None => (String::new(), None),
        };
        let (markdown, truncated) = truncate_markdown(markdown, self.options.max_chars);
        if truncated {
            tracing::info!(
                target: "web.firecrawl",
                url = %target,
                max_chars = self.options.max_chars,
                "firecrawl.scrape.truncated"
            );
        }

        let (title, source_url) = match metadata {
            Some(m) => (m.title, m.source_url),
            None => (None, None),
        };

        tracing::info!(
            target: "web.firecrawl",
            url = %target,
            chars = markdown.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "firecrawl.scrape.success"
        );

        Ok(ScrapedPage {
            url: source_url.unwrap_or_else(|| target.to_string()),
            title,
            markdown,
            truncated,
        })
    }
}

fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| QuillError::Tool(format!("invalid url {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(QuillError::Tool(format!(
            "unsupported url scheme {other:?} in {raw:?}"
        ))),
    }
}

fn scrape_error(url: &Url, started: Instant, e: HttpError) -> QuillError {
    tracing::warn!(
        target: "web.firecrawl",
        url = %url,
        status = ?e.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        error = %e,
        "firecrawl.scrape.error"
    );
    QuillError::Tool(format!("scrape of {url} failed: {e}"))
}

/// Cut `markdown` to `max_chars` characters, appending [`TRUNCATION_SUFFIX`].
///
/// ```
/// use quill_web::firecrawl::truncate_markdown;
///
/// let (text, cut) = truncate_markdown("abcdef".into(), 3);
/// assert_eq!(text, "abc... (truncated)");
/// assert!(cut);
/// ```
pub fn truncate_markdown(markdown: String, max_chars: usize) -> (String, bool) {
    match markdown.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = markdown;
            out.truncate(byte_idx);
            out.push_str(TRUNCATION_SUFFIX);
            (out, true)
        }
        None => (markdown, false),
    }
}
