#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,                 // /help
    Status,               // /status
    Save(Option<String>), // /save [path]
    Clear,                // /clear
    Quit,                 // /quit or /exit
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Command::Unknown(trimmed.to_string());
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match verb {
        "/help" | "/?" => Command::Help,
        "/status" => Command::Status,
        "/save" => Command::Save(rest.map(str::to_string)),
        "/clear" => Command::Clear,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// File name derived from the keyword, e.g. `future-of-solar-power.html`.
pub fn default_save_path(keyword: &str) -> String {
    let mut slug = String::with_capacity(keyword.len());
    for ch in keyword.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "article.html".to_string()
    } else {
        format!("{slug}.html")
    }
}
