use anyhow::Result;
use quill_actors::{ArticleActor, actor::Addr, builder::Builder};
use quill_agent::{ArticleGenerator, GeneratorSettings, ScrapeTool, SearchTool, ToolRegistry};
use quill_common::QuillError;
use quill_config::QuillConfig;
use quill_llm::{LlmConfig, ensure_llm_ready};
use quill_tui::{TuiActor, TuiSettings, restore_terminal, spawn_tui_feeders};
use quill_web::{FirecrawlClient, ScrapeOptions, SerperClient};
use std::sync::Arc;

const ARTICLE_MAILBOX: usize = 16;
const TUI_MAILBOX: usize = 256;

/// Search and scrape tools configured from `cfg`.
pub fn build_tools(cfg: &QuillConfig) -> quill_common::Result<ToolRegistry> {
    let serper_key = cfg.serper_key().unwrap_or_default();
    let serper = match &cfg.search.endpoint {
        Some(url) => SerperClient::with_base_url(url, serper_key)?,
        None => SerperClient::new(serper_key)?,
    }
    .with_num_results(cfg.search.num_results);

    let firecrawl_key = cfg.firecrawl_key().unwrap_or_default();
    let options = ScrapeOptions {
        max_chars: cfg.scrape.max_chars,
        wait_for_ms: cfg.scrape.wait_for_ms,
        ..ScrapeOptions::default()
    };
    let firecrawl = match &cfg.scrape.endpoint {
        Some(url) => FirecrawlClient::with_base_url(url, firecrawl_key)?,
        None => FirecrawlClient::new(firecrawl_key)?,
    }
    .with_options(options);

    Ok(ToolRegistry::new()
        .with(Arc::new(SearchTool::new(serper)))
        .with(Arc::new(ScrapeTool::new(firecrawl))))
}

/// The article generator for `cfg`, or a configuration error naming missing keys.
pub async fn build_generator(cfg: &QuillConfig) -> quill_common::Result<ArticleGenerator> {
    let missing = cfg.missing_keys();
    if !missing.is_empty() {
        return Err(QuillError::Config(format!(
            "missing API keys: {}",
            missing.join(", ")
        )));
    }

    let llm = ensure_llm_ready(&LlmConfig::OpenAi {
        api_key: cfg.openai_key().unwrap_or_default(),
        model: cfg.llm.model.clone(),
        base_url: cfg.llm.endpoint.clone(),
    })
    .await?;
    let tools = build_tools(cfg)?;
    let settings = GeneratorSettings {
        model: cfg.llm.model.clone(),
        temperature: cfg.llm.temperature,
        max_iterations: cfg.agent.max_iterations,
        max_tokens: cfg.llm.max_tokens,
    };
    Ok(ArticleGenerator::new(llm, tools, settings))
}

/// Start the article actor and the terminal UI, then block until quit.
pub async fn run_tui(cfg: QuillConfig) -> Result<()> {
    let mut b = Builder::new();
    let shutdown = b.shutdown_handle();

    // reserve the UI first so its address exists before anything talks to it
    let r_tui = b.reserve::<TuiActor>("tui:main", TUI_MAILBOX);

    let missing = cfg.missing_keys();
    let article: Option<Addr<ArticleActor>> = if missing.is_empty() {
        let generator = build_generator(&cfg).await?;
        Some(b.spawn(
            "article:main",
            ARTICLE_MAILBOX,
            ArticleActor::new(Arc::new(generator)),
        ))
    } else {
        tracing::warn!(missing = ?missing, "article.disabled");
        None
    };

    let settings = TuiSettings {
        model: cfg.llm.model.clone(),
        max_iterations: cfg.agent.max_iterations,
        keys: cfg.key_report(),
    };
    let tui_addr = r_tui.addr();
    let tui = TuiActor::new(article, settings, shutdown.clone())?;
    b.start_reserved(r_tui, tui);
    spawn_tui_feeders(tui_addr, shutdown);

    let res = b.run_until_shutdown().await;
    restore_terminal();
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::Keyword;
    use quill_config::QuillConfigLoader;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, keys: bool) -> QuillConfig {
        let key = if keys { "test-key" } else { "" };
        let yaml = format!(
            r#"
llm:
  api_key: "{key}"
  endpoint: "{base}/v1/"
search:
  api_key: "{key}"
  endpoint: "{base}"
scrape:
  api_key: "{key}"
  endpoint: "{base}/"
agent:
  max_iterations: 3
"#,
            base = server.uri()
        );
        QuillConfigLoader::new().with_yaml_str(&yaml).load().unwrap()
    }

    fn openai_reply(text: &str) -> serde_json::Value {
        json!({
            "status": "completed",
            "model": "gpt-4.1",
            "output": [{
                "type": "message",
                "content": [{ "type": "output_text", "text": text }]
            }]
        })
    }

    #[tokio::test]
    async fn blank_keys_are_a_config_error() {
        let server = MockServer::start().await;
        let err = build_generator(&config_for(&server, false))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, QuillError::Config(_)));
    }

    #[tokio::test]
    async fn configured_endpoints_are_used_end_to_end() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    { "title": "Guide", "link": "https://a.example/guide", "snippet": "s", "position": 1 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        // first turn searches, second answers
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
                "Thought: look it up\nAction: search\nAction Input: {\"query\": \"solar\"}",
            )))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
                "Thought: enough\nAnswer: Solar is growing.",
            )))
            .mount(&server)
            .await;

        let generator = build_generator(&config_for(&server, true)).await.unwrap();
        assert_eq!(generator.settings().max_iterations, 3);

        let article = generator
            .generate(&Keyword::parse("solar").unwrap())
            .await
            .unwrap();
        assert_eq!(article.html, "<p>Solar is growing.</p>");
        assert_eq!(article.steps, 1);
    }
}
