//! Text-protocol ReAct loop.
//!
//! Each turn the model sees the tool catalogue, the task and the scratchpad of
//! earlier steps, and replies with either
//!
//! ```text
//! Thought: ...
//! Action: <tool name>
//! Action Input: {"json": "object"}
//! ```
//!
//! or `Thought: ...` followed by `Answer: ...`. The loop runs the requested
//! tool, appends the observation, and asks again until an answer arrives or
//! the iteration budget runs out.
use crate::tools::ToolRegistry;
use quill_common::{QuillError, Result};
use quill_llm::traits::LlmClient;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Observations longer than this are not repeated in the trace log.
const LOG_PREVIEW_CHARS: usize = 200;

/// One Thought/Action/Observation round.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub thought: String,
    pub action: String,
    pub action_input: Value,
    pub observation: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub steps: Vec<AgentStep>,
}

/// What a single model reply asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Action {
        thought: String,
        tool: String,
        input: Value,
    },
    Answer {
        thought: String,
        answer: String,
    },
}

pub struct ReActAgent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    max_iterations: usize,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ReActAgent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self {
            llm,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Drive the loop until the model answers.
    ///
    /// Tool failures are fed back as `{"error": ...}` observations; model
    /// failures end the run.
    pub async fn run(&self, task: &str) -> Result<AgentOutcome> {
        let system = self.system_prompt();
        let mut steps: Vec<AgentStep> = Vec::new();
        let started = Instant::now();

        for iteration in 1..=self.max_iterations {
            let prompt = render_prompt(task, &steps);
            let resp = self
                .llm
                .generate(&prompt, Some(&system), self.max_tokens, self.temperature)
                .await?;

            match parse_reply(&resp.text)? {
                Reply::Answer { thought, answer } => {
                    tracing::info!(
                        iteration,
                        steps = steps.len(),
                        answer_chars = answer.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "agent.answer"
                    );
                    if !thought.is_empty() {
                        tracing::debug!(%thought, "agent.final_thought");
                    }
                    return Ok(AgentOutcome { answer, steps });
                }
                Reply::Action {
                    thought,
                    tool,
                    input,
                } => {
                    tracing::info!(iteration, %tool, input = %input, "agent.step");
                    let observation = self.call_tool(&tool, input.clone()).await;
                    tracing::debug!(
                        iteration,
                        %tool,
                        observation = %preview(&observation),
                        "agent.observation"
                    );
                    steps.push(AgentStep {
                        thought,
                        action: tool,
                        action_input: input,
                        observation,
                    });
                }
            }
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "agent.max_iterations"
        );
        Err(QuillError::MaxIterations(self.max_iterations))
    }

    async fn call_tool(&self, name: &str, input: Value) -> String {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(tool = %name, "agent.unknown_tool");
            return json!({
                "error": format!(
                    "unknown tool {name:?}; available tools: {}",
                    self.tools.names().join(", ")
                )
            })
            .to_string();
        };
        match tool.call(input).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "agent.tool_error");
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are designed to help with a variety of tasks, from answering questions to \
writing long-form content.

## Tools

You have access to the following tools. Use them as often as needed to gather \
information before answering.

{catalogue}
## Output Format

To use a tool, reply in exactly this format:

```
Thought: <what you need to do next>
Action: <tool name, one of {names}>
Action Input: <JSON object with the tool arguments, e.g. {{\"query\": \"hello world\"}}>
```

Then stop. The tool result will be sent back to you as `Observation: ...`. \
Never write the Observation yourself.

When you have enough information, reply in this format:

```
Thought: I can answer without using any more tools.
Answer: <your final answer>
```
",
            catalogue = self.tools.describe(),
            names = self.tools.names().join(", "),
        )
    }
}

/// Task followed by the scratchpad of previous steps.
fn render_prompt(task: &str, steps: &[AgentStep]) -> String {
    let mut prompt = String::with_capacity(task.len() + steps.len() * 512);
    prompt.push_str(task.trim());
    prompt.push_str("\n\n");
    for step in steps {
        if !step.thought.is_empty() {
            prompt.push_str(&format!("Thought: {}\n", step.thought));
        }
        prompt.push_str(&format!(
            "Action: {}\nAction Input: {}\nObservation: {}\n\n",
            step.action, step.action_input, step.observation
        ));
    }
    if !steps.is_empty() {
        prompt.push_str("Continue from the last Observation.\n");
    }
    prompt
}

fn marker_regex() -> Result<&'static Regex> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"(?m)^[ \t]*(\*\*)?(Thought|Action Input|Action|Answer|Observation)\**[ \t]*:")
        .map_err(|e| QuillError::Agent(format!("marker regex: {e}")))?;
    Ok(RE.get_or_init(|| re))
}

/// Parse one model reply.
///
/// Anything from the first `Observation:` on is discarded. A reply with
/// neither an action nor an answer is taken as the answer itself.
pub fn parse_reply(raw: &str) -> Result<Reply> {
    let re = marker_regex()?;

    let mut cut = raw.len();
    let mut markers: Vec<Marker<'_>> = Vec::new();
    for caps in re.captures_iter(raw) {
        let (Some(whole), Some(kind)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if kind.as_str() == "Observation" {
            cut = whole.start();
            break;
        }
        // `**Answer:**` closes the bold after the colon.
        let mut body = whole.end();
        if caps.get(1).is_some() && raw[body..].starts_with("**") {
            body += 2;
        }
        markers.push(Marker {
            kind: kind.as_str(),
            start: whole.start(),
            body,
        });
    }

    let first = |kind: &str| markers.iter().position(|m| m.kind == kind);
    let section = |idx: usize| section_text(raw, &markers, idx, cut);

    let thought = first("Thought").map(section).unwrap_or_default().to_string();
    let action = first("Action");
    let answer = first("Answer");

    // An action only counts when it comes before any answer.
    if let Some(a) = action.filter(|&a| answer.map_or(true, |n| a < n)) {
        let tool = section(a)
            .trim_matches(|c: char| c == '`' || c == '"' || c == '\'')
            .trim()
            .to_string();
        let input = first("Action Input")
            .map(|i| parse_action_input(section(i)))
            .unwrap_or_else(|| json!({}));
        return Ok(Reply::Action {
            thought,
            tool,
            input,
        });
    }

    if let Some(n) = answer {
        return Ok(Reply::Answer {
            thought,
            // Runs to the cut point so lines like "Action:" inside the article survive.
            answer: raw[markers[n].body..cut].trim().to_string(),
        });
    }

    let body = match first("Thought") {
        Some(t) => &raw[markers[t].body..cut],
        None => &raw[..cut],
    };
    Ok(Reply::Answer {
        thought: String::new(),
        answer: body.trim().to_string(),
    })
}

struct Marker<'a> {
    kind: &'a str,
    start: usize,
    body: usize,
}

/// Text between marker `idx` and the next marker (or the cut point).
fn section_text<'a>(raw: &'a str, markers: &[Marker<'_>], idx: usize, cut: usize) -> &'a str {
    let end = markers.get(idx + 1).map(|m| m.start).unwrap_or(cut);
    raw[markers[idx].body..end].trim()
}

/// Decode `Action Input`, tolerating fences, prose around the object, and bare strings.
pub fn parse_action_input(raw: &str) -> Value {
    let text = strip_fence(raw.trim());
    if text.is_empty() {
        return json!({});
    }
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return v;
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return v;
            }
        }
    }
    let bare = match serde_json::from_str::<Value>(text) {
        Ok(Value::String(s)) => s,
        _ => text.trim_matches(|c: char| c == '"' || c == '\'').to_string(),
    };
    json!({ "input": bare })
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn preview(s: &str) -> String {
    match s.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
