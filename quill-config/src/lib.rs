//! Configuration for Quill: `.env` loading, an optional YAML file, and
//! `QUILL__`-prefixed environment overrides.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, inline YAML
//! snippets, then environment variables such as `QUILL__LLM__MODEL=gpt-4.1-mini`.
//! After merging, `${VAR}` placeholders in string values are expanded from the
//! process environment (up to eight levels deep).
//!
//! API keys may be set in the file or left out; a missing key falls back to
//! the conventional variable (`OPENAI_API_KEY`, `SERPER_API_KEY`,
//! `FIRECRAWL_API_KEY`).
//!
//! ```yaml
//! llm:
//!   model: gpt-4.1
//!   api_key: "${OPENAI_API_KEY}"
//!   temperature: 0.2
//! search:
//!   num_results: 5
//! scrape:
//!   max_chars: 10000
//! agent:
//!   max_iterations: 15
//! ```
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

pub use config::ConfigError;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
pub const CONFIG_FILE_NAME: &str = "quill.yaml";

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const SERPER_API_KEY: &str = "SERPER_API_KEY";
pub const FIRECRAWL_API_KEY: &str = "FIRECRAWL_API_KEY";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuillConfig {
    pub llm: LlmSection,
    pub search: SearchSection,
    pub scrape: ScrapeSection,
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// OpenAI-compatible base URL; `None` means the public API.
    pub endpoint: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".into(),
            api_key: None,
            temperature: 0.2,
            max_tokens: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSection {
    pub api_key: Option<String>,
    pub num_results: u32,
    pub endpoint: Option<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key: None,
            num_results: 5,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrapeSection {
    pub api_key: Option<String>,
    pub max_chars: usize,
    pub wait_for_ms: u64,
    pub endpoint: Option<String>,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            api_key: None,
            max_chars: 10_000,
            wait_for_ms: 1000,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self { max_iterations: 15 }
    }
}

/// Whether a required key is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Loaded,
    /// Present but blank.
    Empty,
    Missing,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyStatus::Loaded => "loaded",
            KeyStatus::Empty => "empty",
            KeyStatus::Missing => "missing",
        })
    }
}

/// Status of one required key, named by its environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub name: &'static str,
    pub status: KeyStatus,
}

impl QuillConfig {
    pub fn openai_key(&self) -> Option<String> {
        resolve_key(self.llm.api_key.as_deref(), OPENAI_API_KEY)
    }

    pub fn serper_key(&self) -> Option<String> {
        resolve_key(self.search.api_key.as_deref(), SERPER_API_KEY)
    }

    pub fn firecrawl_key(&self) -> Option<String> {
        resolve_key(self.scrape.api_key.as_deref(), FIRECRAWL_API_KEY)
    }

    /// Status of every key needed to generate an article.
    pub fn key_report(&self) -> Vec<KeyReport> {
        [
            (OPENAI_API_KEY, self.llm.api_key.as_deref()),
            (SERPER_API_KEY, self.search.api_key.as_deref()),
            (FIRECRAWL_API_KEY, self.scrape.api_key.as_deref()),
        ]
        .into_iter()
        .map(|(name, configured)| KeyReport {
            name,
            status: key_status(configured, name),
        })
        .collect()
    }

    /// Names of keys that are not [`KeyStatus::Loaded`].
    pub fn missing_keys(&self) -> Vec<&'static str> {
        self.key_report()
            .into_iter()
            .filter(|r| r.status != KeyStatus::Loaded)
            .map(|r| r.name)
            .collect()
    }
}

/// A configured value wins unless it is blank or still holds an unexpanded `${VAR}`.
fn configured_value(configured: Option<&str>) -> Option<&str> {
    configured.filter(|v| !v.contains("${"))
}

fn resolve_key(configured: Option<&str>, env_name: &str) -> Option<String> {
    let value = match configured_value(configured) {
        Some(v) => v.to_string(),
        None => std::env::var(env_name).ok()?,
    };
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn key_status(configured: Option<&str>, env_name: &str) -> KeyStatus {
    let value = match configured_value(configured) {
        Some(v) => Some(v.to_string()),
        None => std::env::var(env_name).ok(),
    };
    match value {
        None => KeyStatus::Missing,
        Some(v) if v.trim().is_empty() => KeyStatus::Empty,
        Some(_) => KeyStatus::Loaded,
    }
}

/// Load `.env` from the working directory or its parents, if one exists.
///
/// Existing environment variables are not overwritten.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "config.dotenv.loaded");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "config.dotenv.invalid");
            None
        }
    }
}

/// `./quill.yaml`, then `<config dir>/quill/quill.yaml`, whichever exists first.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("quill").join(CONFIG_FILE_NAME))
        .filter(|p| p.is_file())
}

/// String fields whose `QUILL__` overrides are kept verbatim.
///
/// `try_parsing` turns an all-digit value into a number, which would reject
/// a numeric API key or silently round a long one.
const STRING_OVERRIDES: &[(&str, &str)] = &[
    ("llm", "model"),
    ("llm", "api_key"),
    ("llm", "endpoint"),
    ("search", "api_key"),
    ("search", "endpoint"),
    ("scrape", "api_key"),
    ("scrape", "endpoint"),
];

fn restore_string_overrides(v: &mut Value) {
    let Some(root) = v.as_object_mut() else {
        return;
    };
    for (section, field) in STRING_OVERRIDES {
        let var = format!(
            "QUILL__{}__{}",
            section.to_ascii_uppercase(),
            field.to_ascii_uppercase()
        );
        let Ok(raw) = std::env::var(&var) else {
            continue;
        };
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(field.to_string(), Value::String(raw));
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct QuillConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for QuillConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl QuillConfigLoader {
    /// Start from defaults plus `QUILL__` env overrides.
    ///
    /// ```
    /// use quill_config::QuillConfigLoader;
    ///
    /// let cfg = QuillConfigLoader::new().load().unwrap();
    /// assert_eq!(cfg.agent.max_iterations, 15);
    /// assert_eq!(cfg.search.num_results, 5);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder();
        Self { builder }
    }

    /// Attach a config file that must exist; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a config file that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use quill_config::QuillConfigLoader;
    ///
    /// let cfg = QuillConfigLoader::new()
    ///     .with_yaml_str("llm:\n  model: gpt-4.1-mini\nagent:\n  max_iterations: 4\n")
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.llm.model, "gpt-4.1-mini");
    /// assert_eq!(cfg.agent.max_iterations, 4);
    /// assert!((cfg.llm.temperature - 0.2).abs() < f32::EPSILON);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, and deserialize.
    pub fn load(self) -> Result<QuillConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("QUILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        restore_string_overrides(&mut v);
        expand_env_in_value(&mut v);

        let typed: QuillConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        tracing::debug!(
            model = %typed.llm.model,
            max_iterations = typed.agent.max_iterations,
            "config.loaded"
        );
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    #[serial]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    #[serial]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!(["hello-$CITY", { "loc": "${CITY}-${STATE}" }, 42, true, null]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    #[serial]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    #[serial]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    #[serial]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    #[serial]
    fn key_status_distinguishes_empty_from_missing() {
        temp_env::with_vars(
            [
                (OPENAI_API_KEY, Some("sk-live")),
                (SERPER_API_KEY, Some("  ")),
                (FIRECRAWL_API_KEY, None::<&str>),
            ],
            || {
                let cfg = QuillConfig::default();
                let statuses: Vec<KeyStatus> =
                    cfg.key_report().into_iter().map(|r| r.status).collect();
                assert_eq!(
                    statuses,
                    vec![KeyStatus::Loaded, KeyStatus::Empty, KeyStatus::Missing]
                );
                assert_eq!(cfg.missing_keys(), vec![SERPER_API_KEY, FIRECRAWL_API_KEY]);
                assert_eq!(cfg.openai_key().as_deref(), Some("sk-live"));
                assert!(cfg.serper_key().is_none());
            },
        );
    }

    #[test]
    #[serial]
    fn configured_key_wins_over_environment() {
        temp_env::with_var(SERPER_API_KEY, Some("from-env"), || {
            let mut cfg = QuillConfig::default();
            cfg.search.api_key = Some("from-file".into());
            assert_eq!(cfg.serper_key().as_deref(), Some("from-file"));

            cfg.search.api_key = Some("${UNSET_SERPER_PLACEHOLDER}".into());
            assert_eq!(cfg.serper_key().as_deref(), Some("from-env"));
        });
    }
}
