use async_trait::async_trait;
use quill_agent::{ArticleGenerator, GeneratorSettings, ScrapeTool, SearchTool, ToolRegistry};
use quill_common::{Keyword, QuillError, Result};
use quill_llm::traits::{LlmClient, LlmResponse};
use quill_web::{FirecrawlClient, SerperClient};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        assert_eq!(temperature, Some(0.2));
        self.prompts.lock().unwrap().push(prompt.to_string());
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| QuillError::Llm("no more replies".into()))?;
        Ok(LlmResponse {
            text,
            model: None,
            tokens_used: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

async fn tools(server: &MockServer) -> ToolRegistry {
    let serper = SerperClient::with_base_url(&server.uri(), "serper-key".into()).unwrap();
    let firecrawl = FirecrawlClient::with_base_url(&server.uri(), "fc-key".into()).unwrap();
    ToolRegistry::new()
        .with(Arc::new(SearchTool::new(serper)))
        .with(Arc::new(ScrapeTool::new(firecrawl)))
}

#[tokio::test]
async fn keyword_becomes_article_through_search_and_scrape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"q": "community solar"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic": [
                {"title": "Community solar guide", "link": "https://energy.example/guide", "snippet": "How shared arrays work", "position": 1}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({"url": "https://energy.example/guide"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"markdown": "# Guide\n\nSubscribers share one array."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let llm = ScriptedLlm::new(vec![
        "Thought: find sources\nAction: search\nAction Input: {\"query\": \"community solar\"}".into(),
        "Thought: read the guide\nAction: scrape\nAction Input: {\"url\": \"https://energy.example/guide\"}".into(),
        "Thought: I can answer without using any more tools.\nAnswer: <h1>Community Solar</h1>\n<p>Subscribers share one array.</p>\n<h2>Sources</h2>\n<ul><li><a href=\"https://energy.example/guide\">https://energy.example/guide</a></li></ul>".into(),
    ]);

    let generator = ArticleGenerator::new(llm.clone(), tools(&server).await, GeneratorSettings::default());
    let kw = Keyword::parse("community solar").unwrap();
    let article = generator.generate(&kw).await.unwrap();

    assert!(article.html.starts_with("<h1>Community Solar</h1>"));
    assert!(article.html.contains("<h2>Sources</h2>"));
    assert_eq!(article.steps, 2);
    assert_eq!(article.keyword, kw);

    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[1].contains("\"url\":\"https://energy.example/guide\""));
    assert!(prompts[2].contains("Subscribers share one array."));
}

#[tokio::test]
async fn failed_scrape_is_reported_to_the_model_and_plain_answer_is_wrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Page timed out"
        })))
        .mount(&server)
        .await;

    let llm = ScriptedLlm::new(vec![
        "Action: scrape\nAction Input: {\"url\": \"https://slow.example/\"}".into(),
        "Thought: no sources\nAnswer: I was unable to generate the article due to lack of sources.".into(),
    ]);
    let generator = ArticleGenerator::new(llm.clone(), tools(&server).await, GeneratorSettings::default());
    let article = generator
        .generate(&Keyword::parse("slow pages").unwrap())
        .await
        .unwrap();

    assert_eq!(
        article.html,
        "<p>I was unable to generate the article due to lack of sources.</p>"
    );
    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[1].contains("Observation: {\"error\":"));
    assert!(prompts[1].contains("Page timed out"));
}

#[tokio::test]
async fn iteration_budget_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"organic": []})))
        .mount(&server)
        .await;

    let replies = (0..3)
        .map(|i| format!("Action: search\nAction Input: {{\"query\": \"try {i}\"}}"))
        .collect();
    let settings = GeneratorSettings {
        max_iterations: 3,
        ..Default::default()
    };
    let generator = ArticleGenerator::new(ScriptedLlm::new(replies), tools(&server).await, settings);
    let err = generator
        .generate(&Keyword::parse("endless").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, QuillError::MaxIterations(3)));
}
