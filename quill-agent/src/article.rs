use crate::react::{ReActAgent, DEFAULT_MAX_ITERATIONS};
use crate::tools::ToolRegistry;
use quill_common::{GeneratedArticle, Keyword, Result};
use quill_llm::traits::LlmClient;
use quill_llm::DEFAULT_OPENAI_MODEL;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Knobs for one [`ArticleGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    /// Recorded in logs; the client decides which model is actually called.
    pub model: String,
    pub temperature: f32,
    pub max_iterations: usize,
    pub max_tokens: Option<u32>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: None,
        }
    }
}

/// Turns a keyword into an HTML article with a search/scrape agent.
pub struct ArticleGenerator {
    agent: ReActAgent,
    settings: GeneratorSettings,
}

impl ArticleGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, settings: GeneratorSettings) -> Self {
        let mut agent = ReActAgent::new(llm, tools)
            .with_max_iterations(settings.max_iterations)
            .with_temperature(settings.temperature);
        if let Some(n) = settings.max_tokens {
            agent = agent.with_max_tokens(n);
        }
        tracing::info!(
            model = %settings.model,
            max_iterations = agent.max_iterations(),
            tools = ?agent.tools().names(),
            "article.generator.ready"
        );
        Self { agent, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Research `keyword` and return the article as HTML.
    pub async fn generate(&self, keyword: &Keyword) -> Result<GeneratedArticle> {
        let started = Instant::now();
        tracing::info!(keyword = %keyword, model = %self.settings.model, "article.generate.start");

        let outcome = self
            .agent
            .run(&render_prompt(keyword))
            .await
            .inspect_err(|e| {
                tracing::error!(keyword = %keyword, error = %e, "article.generate.failed");
            })?;

        let html = ensure_html(&outcome.answer);
        tracing::info!(
            keyword = %keyword,
            steps = outcome.steps.len(),
            html_chars = html.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "article.generate.success"
        );

        Ok(GeneratedArticle {
            keyword: keyword.clone(),
            html,
            steps: outcome.steps.len(),
            elapsed: started.elapsed(),
        })
    }
}

/// Wrap answers that do not look like markup in a single paragraph.
///
/// ```
/// use quill_agent::article::ensure_html;
///
/// assert_eq!(ensure_html("  <h1>Hi</h1>"), "  <h1>Hi</h1>");
/// assert_eq!(ensure_html("No sources found."), "<p>No sources found.</p>");
/// ```
pub fn ensure_html(answer: &str) -> String {
    if answer.trim_start().starts_with('<') {
        answer.to_string()
    } else {
        tracing::warn!("article.answer.not_html");
        format!("<p>{answer}</p>")
    }
}

/// The task handed to the agent for one keyword.
pub fn render_prompt(keyword: &Keyword) -> String {
    let kw = keyword.as_str();
    format!(
        r#"You are an expert writer tasked with creating a comprehensive and engaging article.
Your goal is to synthesize information from multiple reliable sources to produce a single, well-structured HTML article about: "{kw}".

Follow these steps:
1.  Use the 'search' tool to find relevant articles and sources about "{kw}". Aim for 3-5 diverse and reputable sources if possible.
2.  Analyze the search results. Identify promising URLs that likely contain detailed information.
3.  Use the 'scrape' tool to extract the main content (in markdown format) from the selected URLs. Scrape at least 2-3 different sources to ensure a comprehensive overview. **Keep track of the URLs you successfully scrape content from.**
4.  Synthesize the information gathered from the scraped content.
5.  Write a single, coherent article based *only* on the information you scraped. Do not add information not present in the sources.
6.  Format the final article strictly as HTML. Use appropriate tags like <h1>, <h2>, <p>, <ul>, <li>, <strong>, etc. for structure and readability.
7.  The article should be informative, well-organized, and easy to read.
8.  Include a brief introductory paragraph and a concluding summary.
9.  **At the end of the article, add a section titled 'Sources' (e.g., using an <h2> tag). Under this heading, list the URLs you successfully scraped content from in step 3, ideally as an unordered list (<ul><li><a>...</a></li></ul>).**
10. Do NOT include any preamble like "Here is the HTML article:". Just output the raw HTML starting with the <h1> tag and ending with the sources list.
11. If you encounter errors during search or scraping, try alternative queries or URLs, but if you cannot gather sufficient information after a reasonable number of attempts, state that you were unable to generate the article due to lack of sources (as a simple HTML paragraph).

Generate the HTML article now."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_keyword_and_tools() {
        let kw = Keyword::parse("offshore wind").unwrap();
        let prompt = render_prompt(&kw);
        assert!(prompt.contains("HTML article about: \"offshore wind\""));
        assert!(prompt.contains("'search' tool"));
        assert!(prompt.contains("'scrape' tool"));
        assert!(prompt.contains("'Sources'"));
        assert!(prompt.contains("11. "));
    }

    #[test]
    fn html_answers_pass_through() {
        assert_eq!(ensure_html("<h1>T</h1><p>x</p>"), "<h1>T</h1><p>x</p>");
        assert_eq!(ensure_html("\n<p>x</p>"), "\n<p>x</p>");
    }

    #[test]
    fn plain_answers_are_wrapped() {
        assert_eq!(
            ensure_html("Unable to generate the article."),
            "<p>Unable to generate the article.</p>"
        );
    }

    #[test]
    fn defaults_match_the_published_settings() {
        let s = GeneratorSettings::default();
        assert_eq!(s.model, "gpt-4.1");
        assert_eq!(s.max_iterations, 15);
        assert!((s.temperature - 0.2).abs() < f32::EPSILON);
        assert!(s.max_tokens.is_none());
    }
}
