//! One generation without the terminal UI.
use crate::wiring::build_generator;
use anyhow::{Context, Result};
use quill_common::Keyword;
use quill_config::QuillConfig;
use std::path::Path;

pub async fn run(cfg: &QuillConfig, raw_keyword: &str, output: Option<&Path>) -> Result<()> {
    let keyword = Keyword::parse(raw_keyword)?;
    let generator = build_generator(cfg).await?;
    let article = generator.generate(&keyword).await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, article.html.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), steps = article.steps, "headless.saved");
        }
        None => println!("{}", article.html),
    }
    Ok(())
}
