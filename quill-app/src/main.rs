use anyhow::{Context, Result};
use clap::Parser;
use quill_common::observability::{LogConfig, init_logging};
use quill_config::{QuillConfig, QuillConfigLoader, default_config_path, load_dotenv};
use std::path::{Path, PathBuf};

mod headless;
mod wiring;

/// Research a keyword on the web and write an HTML article about it.
#[derive(Debug, Parser)]
#[command(name = "quill", version, about)]
struct Cli {
    /// YAML configuration file. Defaults to ./quill.yaml, then the user config directory.
    #[arg(short, long, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    /// Write one article without the terminal UI and print its HTML.
    #[arg(short, long)]
    keyword: Option<String>,

    /// Write the HTML to this file instead of stdout.
    #[arg(short, long, requires = "keyword")]
    output: Option<PathBuf>,

    /// Mirror logs to stderr in headless mode.
    #[arg(long)]
    log_stderr: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) .env first so `${VAR}` placeholders and key fallbacks can see it
    let dotenv = load_dotenv();

    // 2) config (env wins over the file)
    let cfg = load_config(cli.config.as_deref())?;

    // 3) logging; stderr belongs to the terminal UI unless headless
    let log_file = init_logging(LogConfig {
        emit_stderr: cli.log_stderr && cli.keyword.is_some(),
        ..LogConfig::default()
    })?;
    tracing::info!(
        log_file = %log_file.display(),
        dotenv = ?dotenv,
        model = %cfg.llm.model,
        "quill.start"
    );

    match cli.keyword {
        Some(keyword) => headless::run(&cfg, &keyword, cli.output.as_deref()).await,
        None => wiring::run_tui(cfg).await,
    }
}

fn load_config(explicit: Option<&Path>) -> Result<QuillConfig> {
    let loader = match (explicit, default_config_path()) {
        (Some(path), _) => QuillConfigLoader::new().with_file(path),
        (None, Some(found)) => QuillConfigLoader::new().with_optional_file(found),
        (None, None) => QuillConfigLoader::new(),
    };
    loader.load().context("failed to load configuration")
}
