use quill_common::QuillError;
use quill_web::firecrawl::TRUNCATION_SUFFIX;
use quill_web::{FirecrawlClient, ScrapeOptions, SerperClient};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn serper_search_sends_key_header_and_maps_organic_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("x-api-key", "serper-key"))
        .and(body_json(json!({"q": "solar power", "num": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchParameters": {"q": "solar power"},
            "organic": [
                {"title": "Solar 101", "link": "https://a.example/solar", "snippet": "Basics", "position": 1},
                {"title": "Panels", "link": "https://b.example/panels", "snippet": "Cost", "position": 2}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SerperClient::with_base_url(&server.uri(), "serper-key".into()).unwrap();
    let results = client.search("  solar power ", Some(3)).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Solar 101");
    assert_eq!(results[1].url, "https://b.example/panels");
    assert_eq!(results[1].position, 2);
}

#[tokio::test]
async fn serper_uses_configured_default_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"num": 7})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"organic": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = SerperClient::with_base_url(&server.uri(), "k".into())
        .unwrap()
        .with_num_results(7);
    assert!(client.search("rust", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn serper_empty_query_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = SerperClient::with_base_url(&server.uri(), "k".into()).unwrap();
    let err = client.search("   ", None).await.unwrap_err();
    assert!(matches!(err, QuillError::Tool(_)));
}

#[tokio::test]
async fn serper_auth_failure_is_a_tool_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "Unauthorized."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = SerperClient::with_base_url(&server.uri(), "bad".into()).unwrap();
    let err = client.search("rust", None).await.unwrap_err();
    assert!(matches!(err, QuillError::Tool(_)));
    assert!(err.to_string().contains("Unauthorized."));
}

#[tokio::test]
async fn firecrawl_scrape_sends_options_and_reads_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(header("authorization", "Bearer fc-key"))
        .and(body_json(json!({
            "url": "https://a.example/solar",
            "formats": ["markdown"],
            "excludeTags": ["script", "style", "svg", "iframe", "footer", "nav", "header"],
            "onlyMainContent": true,
            "waitFor": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "markdown": "# Solar\n\nPanels convert light.",
                "metadata": {"title": "Solar 101", "sourceURL": "https://a.example/solar"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FirecrawlClient::with_base_url(&server.uri(), "fc-key".into()).unwrap();
    let page = client.scrape("https://a.example/solar").await.unwrap();

    assert_eq!(page.title.as_deref(), Some("Solar 101"));
    assert_eq!(page.url, "https://a.example/solar");
    assert!(page.markdown.starts_with("# Solar"));
    assert!(!page.truncated);
}

#[tokio::test]
async fn firecrawl_truncates_long_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"markdown": "x".repeat(50)}
        })))
        .mount(&server)
        .await;

    let client = FirecrawlClient::with_base_url(&server.uri(), "fc-key".into())
        .unwrap()
        .with_options(ScrapeOptions {
            max_chars: 20,
            ..Default::default()
        });
    let page = client.scrape("https://long.example/").await.unwrap();

    assert!(page.truncated);
    assert_eq!(page.markdown, format!("{}{TRUNCATION_SUFFIX}", "x".repeat(20)));
}

#[tokio::test]
async fn firecrawl_unsuccessful_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Blocked by robots.txt"
        })))
        .mount(&server)
        .await;

    let client = FirecrawlClient::with_base_url(&server.uri(), "fc-key".into()).unwrap();
    let err = client.scrape("https://blocked.example/").await.unwrap_err();
    assert!(err.to_string().contains("Blocked by robots.txt"));
}

#[tokio::test]
async fn firecrawl_missing_markdown_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {}})),
        )
        .mount(&server)
        .await;

    let client = FirecrawlClient::with_base_url(&server.uri(), "fc-key".into()).unwrap();
    let page = client.scrape("https://empty.example/").await.unwrap();
    assert!(page.markdown.is_empty());
    assert_eq!(page.url, "https://empty.example/");
    assert!(page.title.is_none());
}

#[tokio::test]
async fn firecrawl_rejects_non_web_urls_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = FirecrawlClient::with_base_url(&server.uri(), "fc-key".into()).unwrap();
    assert!(client.scrape("ftp://files.example/doc").await.is_err());
}
