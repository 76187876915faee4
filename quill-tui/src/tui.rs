use crate::{
    command::{Command, default_save_path, parse_command},
    html::{LineKind, html_to_lines},
    styles,
    transcript::TranscriptLine,
    view::{self, StatusSnap, ViewSnap},
};
use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    event::{Event as CtEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use quill_actors::{
    ArticleActor, ArticleMsg,
    actor::{Actor, Addr, Context},
    system::ShutdownHandle,
};
use quill_common::{GeneratedArticle, Keyword, QuillError};
use quill_config::{KeyReport, KeyStatus};
use ratatui::{Terminal, backend::CrosstermBackend, style::Style};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

const BRAILLE_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// What the UI shows about the configured backend.
#[derive(Debug, Clone)]
pub struct TuiSettings {
    pub model: String,
    pub max_iterations: usize,
    pub keys: Vec<KeyReport>,
}

impl TuiSettings {
    fn missing_keys(&self) -> Vec<&'static str> {
        self.keys
            .iter()
            .filter(|k| k.status != KeyStatus::Loaded)
            .map(|k| k.name)
            .collect()
    }
}

pub enum TuiMsg {
    InputEvent(CtEvent),
    Tick,
    Submit(String),
    ArticleDone {
        keyword: Keyword,
        result: quill_common::Result<GeneratedArticle>,
    },
    OpError(String),
    ScrollUp,
    ScrollDown,
    Shutdown,
}

/// The article currently on screen, kept for `/save`.
struct Current {
    keyword: Keyword,
    html: String,
}

/// What a submitted line turned into once it passed the checks.
enum Submission {
    Command(Command),
    Generate(Keyword),
}

/// Transcript and generation state, kept apart from the terminal.
struct Session {
    settings: TuiSettings,
    lines: Vec<TranscriptLine>, // transcript buffer
    scroll: usize,              // from bottom
    dirty: bool,
    running: Option<(Keyword, Instant)>,
    current: Option<Current>,
    spin_idx: usize,
}

impl Session {
    fn new(settings: TuiSettings, enabled: bool) -> Self {
        let lines = intro_lines(&settings, enabled);
        Self {
            settings,
            lines,
            scroll: 0,
            dirty: true,
            running: None,
            current: None,
            spin_idx: 0,
        }
    }

    fn push_styled<S: Into<String>>(&mut self, s: S, style: Style) {
        self.lines.push(TranscriptLine::new(s.into(), style));
        self.dirty = true;
    }

    fn push_blank(&mut self) {
        self.push_styled(String::new(), Style::default());
    }

    fn extend(&mut self, lines: Vec<TranscriptLine>) {
        self.lines.extend(lines);
        self.scroll = 0;
        self.dirty = true;
    }

    fn spinner(&self) -> &'static str {
        if self.running.is_some() {
            BRAILLE_FRAMES[self.spin_idx % BRAILLE_FRAMES.len()]
        } else {
            " "
        }
    }

    fn step_spinner(&mut self) {
        if self.running.is_some() {
            self.spin_idx = (self.spin_idx + 1) % BRAILLE_FRAMES.len();
            self.dirty = true;
        }
    }

    fn status_snap(&self) -> StatusSnap {
        StatusSnap {
            spinner: self.spinner(),
            running: self
                .running
                .as_ref()
                .map(|(kw, started)| (kw.to_string(), started.elapsed().as_secs())),
            model: self.settings.model.clone(),
            keys: self.settings.keys.clone(),
        }
    }

    /// Check a submitted line. Rejections are reported in the transcript.
    fn accept(&mut self, line: &str, enabled: bool) -> Option<Submission> {
        let s = line.trim();
        if s.is_empty() {
            self.push_styled("Please enter a keyword.", styles::dim());
            self.push_blank();
            return None;
        }

        if s.starts_with('/') {
            return Some(Submission::Command(parse_command(s)));
        }

        if let Some((running, _)) = &self.running {
            let notice = format!("× Still writing about '{running}'. Wait for it to finish.");
            self.push_styled(notice, styles::error());
            self.push_blank();
            return None;
        }

        if !enabled {
            let missing = self.settings.missing_keys().join(", ");
            self.push_styled(
                format!("× Generation is disabled: {missing} not set."),
                styles::error(),
            );
            self.push_styled(
                "  Add the keys to .env or quill.yaml and restart.",
                styles::dim(),
            );
            self.push_blank();
            return None;
        }

        match Keyword::parse(s) {
            Ok(keyword) => Some(Submission::Generate(keyword)),
            Err(e) => {
                self.push_styled(format!("× {e}"), styles::error());
                self.push_blank();
                None
            }
        }
    }

    fn start_generation(&mut self, keyword: &Keyword) {
        self.push_styled("→ [Keyword]", styles::user_header());
        self.push_styled(format!("  {keyword}"), styles::user_text());
        self.push_blank();
        self.running = Some((keyword.clone(), Instant::now()));
    }

    fn finish_generation(
        &mut self,
        keyword: Keyword,
        result: quill_common::Result<GeneratedArticle>,
    ) {
        self.running = None;
        match result {
            Ok(article) => {
                tracing::info!(
                    keyword = %keyword,
                    steps = article.steps,
                    elapsed_ms = article.elapsed.as_millis() as u64,
                    "tui.generate.done"
                );
                self.push_styled(
                    format!(
                        "← [Article] {} ({} step(s), {:.1}s)",
                        keyword,
                        article.steps,
                        article.elapsed.as_secs_f32()
                    ),
                    styles::article_header(),
                );
                self.extend(article_lines(&article.html));
                self.push_blank();
                self.current = Some(Current {
                    keyword,
                    html: article.html,
                });
            }
            Err(e) => {
                tracing::warn!(keyword = %keyword, error = %e, "tui.generate.failed");
                self.push_styled(format!("× Error: {e}"), styles::error());
                self.push_blank();
                self.current = Some(Current {
                    keyword,
                    html: error_html(&e),
                });
            }
        }
    }

    async fn save_current(&mut self, path: Option<String>) {
        let Some(current) = &self.current else {
            self.push_styled("× Nothing to save yet.", styles::error());
            self.push_blank();
            return;
        };
        let path =
            PathBuf::from(path.unwrap_or_else(|| default_save_path(current.keyword.as_str())));
        match tokio::fs::write(&path, current.html.as_bytes()).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "tui.article.saved");
                self.push_styled(format!("✓ Saved to {}", path.display()), styles::ok());
            }
            Err(e) => {
                self.push_styled(
                    format!("× Could not write {}: {e}", path.display()),
                    styles::error(),
                );
            }
        }
        self.push_blank();
    }

    /// Run every command except `/quit`, which needs the actor's address.
    async fn run_command(&mut self, cmd: Command) {
        match cmd {
            Command::Quit => {}
            Command::Help => {
                self.push_styled("Commands:", styles::label());
                self.push_styled("  <keyword>       write an article about it", styles::value());
                self.push_styled("  /status         API keys and model", styles::value());
                self.push_styled("  /save [path]    write the current article as HTML", styles::value());
                self.push_styled("  /clear          clear the transcript", styles::value());
                self.push_styled("  /quit           exit", styles::value());
                self.push_blank();
            }
            Command::Status => {
                let lines = status_lines(
                    &self.settings,
                    self.running.as_ref().map(|(kw, started)| (kw, started.elapsed())),
                    self.current.as_ref().map(|c| &c.keyword),
                );
                self.extend(lines);
                self.push_blank();
            }
            Command::Save(path) => self.save_current(path).await,
            Command::Clear => {
                self.lines.clear();
                self.scroll = 0;
                self.dirty = true;
            }
            Command::Unknown(s) => {
                self.push_styled(format!("× Unknown command: {s}"), styles::error());
                self.push_styled("Try `/help`.", styles::dim());
                self.push_blank();
            }
        }
    }
}

pub struct TuiActor {
    // deps; `None` when a required key is missing
    article: Option<Addr<ArticleActor>>,

    // terminal
    term: Terminal<CrosstermBackend<Stdout>>,
    tick_rate: Duration,
    last_tick: Instant,

    // input line
    input: String,
    input_cursor: usize,

    session: Session,

    // shutdown coordination
    shutdown: ShutdownHandle,
}

impl TuiActor {
    pub fn new(
        article: Option<Addr<ArticleActor>>,
        settings: TuiSettings,
        shutdown: ShutdownHandle,
    ) -> Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;
        term.clear()?;

        let session = Session::new(settings, article.is_some());
        Ok(Self {
            article,
            term,
            tick_rate: Duration::from_millis(80),
            last_tick: Instant::now(),
            input: String::new(),
            input_cursor: 0,
            session,
            shutdown,
        })
    }

    fn cursor_left(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        while self.input_cursor > 0 && !self.input.is_char_boundary(self.input_cursor) {
            self.input_cursor -= 1;
        }
    }

    fn cursor_right(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        self.input_cursor += 1;
        while self.input_cursor < self.input.len()
            && !self.input.is_char_boundary(self.input_cursor)
        {
            self.input_cursor += 1;
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.input.insert(self.input_cursor, ch);
        self.input_cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut prev = self.input_cursor.saturating_sub(1);
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        self.input.drain(prev..self.input_cursor);
        self.input_cursor = prev;
    }

    fn delete(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        let start = self.input_cursor;
        let mut end = start + 1;
        while end < self.input.len() && !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input.drain(start..end);
    }

    fn draw(&mut self) -> Result<()> {
        let snap = ViewSnap::new(
            self.input.clone(),
            self.input_cursor,
            self.session.lines.clone(),
            self.session.scroll,
            self.session.status_snap(),
        );

        view::draw(&mut self.term, &snap)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<TuiMsg> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('q'), KeyModifiers::CONTROL) => return Some(TuiMsg::Shutdown),
            (KeyCode::PageUp, _) => self.session.scroll = self.session.scroll.saturating_add(5),
            (KeyCode::PageDown, _) => self.session.scroll = self.session.scroll.saturating_sub(5),
            (KeyCode::Up, _) => return Some(TuiMsg::ScrollUp),
            (KeyCode::Down, _) => return Some(TuiMsg::ScrollDown),
            (KeyCode::Enter, _) => {
                let line = std::mem::take(&mut self.input);
                self.input_cursor = 0;
                self.session.dirty = true;
                return Some(TuiMsg::Submit(line));
            }
            (KeyCode::Left, _) => self.cursor_left(),
            (KeyCode::Right, _) => self.cursor_right(),
            (KeyCode::Home, _) => self.input_cursor = 0,
            (KeyCode::End, _) => self.input_cursor = self.input.len(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Esc, _) => {
                self.input.clear();
                self.input_cursor = 0;
            }
            (KeyCode::Char(ch), _) => self.insert_char(ch),
            _ => return None,
        }
        self.session.dirty = true;
        None
    }

    async fn route_submit(&mut self, line: String, me: Addr<TuiActor>) {
        let keyword = match self.session.accept(&line, self.article.is_some()) {
            None => return,
            Some(Submission::Command(Command::Quit)) => {
                let _ = me.try_send(TuiMsg::Shutdown);
                return;
            }
            Some(Submission::Command(cmd)) => {
                self.session.run_command(cmd).await;
                return;
            }
            Some(Submission::Generate(keyword)) => keyword,
        };
        let Some(article) = self.article.clone() else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        let msg = ArticleMsg::Generate {
            keyword: keyword.clone(),
            reply: tx,
        };
        if article.try_send(msg).is_err() {
            self.session
                .push_styled("× The article worker is not accepting work.", styles::error());
            self.session.push_blank();
            return;
        }
        tracing::info!(keyword = %keyword, "tui.generate.submitted");
        self.session.start_generation(&keyword);

        tokio::spawn(async move {
            let result = rx.await.unwrap_or_else(|_| {
                Err(QuillError::Agent("the generation was cancelled".into()))
            });
            let _ = me.send(TuiMsg::ArticleDone { keyword, result }).await;
        });
    }
}

#[async_trait]
impl Actor for TuiActor {
    type Msg = TuiMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            TuiMsg::InputEvent(ev) => {
                if let CtEvent::Key(k) = ev
                    && let Some(next) = self.handle_key(k)
                {
                    let _ = ctx.addr().try_send(next);
                }
            }
            TuiMsg::Submit(line) => self.route_submit(line, ctx.addr()).await,
            TuiMsg::ArticleDone { keyword, result } => {
                self.session.finish_generation(keyword, result)
            }
            TuiMsg::OpError(e) => {
                self.session.push_styled(format!("× Error: {e}"), styles::error());
                self.session.push_blank();
            }
            TuiMsg::Tick => {
                self.session.step_spinner();
                if self.session.dirty || self.last_tick.elapsed() >= self.tick_rate {
                    self.draw()?;
                    self.last_tick = Instant::now();
                    self.session.dirty = false;
                }
            }
            TuiMsg::ScrollUp => {
                self.session.scroll = self.session.scroll.saturating_add(1);
                self.session.dirty = true;
            }
            TuiMsg::ScrollDown => {
                self.session.scroll = self.session.scroll.saturating_sub(1);
                self.session.dirty = true;
            }
            TuiMsg::Shutdown => {
                if self.session.running.is_some()
                    && let Some(article) = &self.article
                {
                    let _ = article.try_send(ArticleMsg::Cancel);
                }
                restore_terminal();
                self.shutdown.signal();
                ctx.stop();
            }
        }

        Ok(())
    }
}

/// Leave raw mode and the alternate screen. Safe to call more than once.
pub fn restore_terminal() {
    disable_raw_mode().ok();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Shown when a generation fails, in place of an article.
pub fn error_html(e: &QuillError) -> String {
    format!("<p>Sorry, an error occurred during generation: {e}</p>")
}

/// Styled transcript lines for an HTML article.
pub fn article_lines(html: &str) -> Vec<TranscriptLine> {
    html_to_lines(html)
        .into_iter()
        .map(|line| {
            let (text, style) = match line.kind {
                LineKind::Heading(level) => (format!("  {}", line.text), styles::heading(level)),
                LineKind::Text => (format!("  {}", line.text), styles::body()),
                LineKind::Bullet => (format!("    {}", line.text), styles::bullet()),
                LineKind::Quote => (format!("  │ {}", line.text), styles::quote()),
                LineKind::Code => (format!("    {}", line.text), styles::code()),
                LineKind::Blank => (String::new(), Style::default()),
            };
            TranscriptLine::new(text, style)
        })
        .collect()
}

fn key_line(report: &KeyReport) -> TranscriptLine {
    match report.status {
        KeyStatus::Loaded => TranscriptLine::new(format!("  ✓ {}", report.name), styles::ok()),
        status => TranscriptLine::new(
            format!("  ✗ {} ({status})", report.name),
            styles::error(),
        ),
    }
}

fn intro_lines(settings: &TuiSettings, enabled: bool) -> Vec<TranscriptLine> {
    let mut lines = vec![TranscriptLine::new(
        "Type a keyword and press Enter to write an article. `/help` lists commands.".into(),
        styles::system(),
    )];
    if !enabled {
        lines.push(TranscriptLine::new(
            "Generation is disabled until every key is loaded:".into(),
            styles::error(),
        ));
        lines.extend(settings.keys.iter().map(key_line));
    }
    lines.push(TranscriptLine::new(String::new(), Style::default()));
    lines
}

fn status_lines(
    settings: &TuiSettings,
    running: Option<(&Keyword, Duration)>,
    current: Option<&Keyword>,
) -> Vec<TranscriptLine> {
    let mut lines = vec![TranscriptLine::new("API keys:".into(), styles::label())];
    lines.extend(settings.keys.iter().map(key_line));
    lines.push(TranscriptLine::new(
        format!(
            "Model: {} (max {} iterations)",
            settings.model, settings.max_iterations
        ),
        styles::value(),
    ));
    let generation = match running {
        Some((kw, elapsed)) => format!("Generating: '{kw}' for {}s", elapsed.as_secs()),
        None => "Generating: nothing".to_string(),
    };
    lines.push(TranscriptLine::new(generation, styles::value()));
    let article = match current {
        Some(kw) => format!("Current article: '{kw}'"),
        None => "Current article: (none)".to_string(),
    };
    lines.push(TranscriptLine::new(article, styles::value()));
    lines
}
