use crate::transcript::TranscriptLine;
use anyhow::Result;
use quill_config::{KeyReport, KeyStatus};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use std::io::Stdout;
use textwrap::wrap;

/// Status bar contents.
pub struct StatusSnap {
    pub spinner: &'static str,
    /// Keyword and elapsed seconds of the running generation.
    pub running: Option<(String, u64)>,
    pub model: String,
    pub keys: Vec<KeyReport>,
}

pub struct ViewSnap {
    pub input: String,
    pub input_cursor: usize,
    pub lines: Vec<TranscriptLine>,
    pub scroll: usize,
    pub status: StatusSnap,
}

impl ViewSnap {
    pub fn new(
        input: String,
        input_cursor: usize,
        lines: Vec<TranscriptLine>,
        scroll: usize,
        status: StatusSnap,
    ) -> Self {
        Self {
            input,
            input_cursor,
            lines,
            scroll,
            status,
        }
    }
}

pub fn draw(term: &mut Terminal<CrosstermBackend<Stdout>>, snap: &ViewSnap) -> Result<()> {
    term.draw(|frame| {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let header = Paragraph::new(Line::from(vec![Span::styled(
            " Quill ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]))
        .wrap(Wrap { trim: true });
        frame.render_widget(header, layout[0]);

        // Transcript window
        let visible_h = layout[1].height.saturating_sub(2) as usize;
        let content_width = layout[1].width.saturating_sub(2) as usize;
        let wrapped = wrap_transcript(&snap.lines, content_width);
        let total = wrapped.len();
        let start = total.saturating_sub(visible_h + snap.scroll);
        let end = total.saturating_sub(snap.scroll);

        let items: Vec<ListItem> = wrapped[start..end]
            .iter()
            .map(|(text, style)| {
                let line = Line::from(Span::styled(text.clone(), *style));
                ListItem::new(line)
            })
            .collect();

        let body =
            List::new(items).block(Block::default().borders(Borders::ALL).title(" Transcript "));
        frame.render_widget(body, layout[1]);

        // Input box
        let input_box = Paragraph::new(snap.input.clone())
            .block(Block::default().borders(Borders::ALL).title(" Keyword "));
        frame.render_widget(Clear, layout[2]);
        frame.render_widget(input_box, layout[2]);

        // Caret placement uses the snapshot, not `self`
        let caret_x = layout[2].x + 1 + visual_caret_col(&snap.input, snap.input_cursor);
        let caret_y = layout[2].y + 1;
        frame.set_cursor_position(Position {
            x: caret_x,
            y: caret_y,
        });

        // Status bar
        let status_line = Line::from(status_spans(&snap.status));
        let status = Paragraph::new(status_line)
            .block(Block::default().borders(Borders::ALL).title(" Status "));
        frame.render_widget(status, layout[3]);
    })?;

    Ok(())
}

fn status_spans(status: &StatusSnap) -> Vec<Span<'static>> {
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(status.spinner, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
    ];
    spans.push(match &status.running {
        Some((keyword, secs)) => Span::styled(
            format!("Generating '{keyword}' {secs}s"),
            Style::default().fg(Color::Yellow),
        ),
        None => Span::styled("Idle", Style::default().fg(Color::Green)),
    });
    spans.push(Span::raw(format!(" • {} •", status.model)));
    for key in &status.keys {
        let (mark, color) = match key.status {
            KeyStatus::Loaded => ("✓", Color::Green),
            _ => ("✗", Color::Red),
        };
        spans.push(Span::styled(
            format!(" {mark} {}", key.name),
            Style::default().fg(color),
        ));
    }
    spans
}

fn visual_caret_col(input: &str, cursor: usize) -> u16 {
    use unicode_width::UnicodeWidthStr;
    UnicodeWidthStr::width(&input[..cursor]) as u16
}

fn wrap_transcript(lines: &[TranscriptLine], width: usize) -> Vec<(String, Style)> {
    let effective_width = width.max(1);
    let mut out = Vec::new();

    for entry in lines {
        let style = entry.style;
        if entry.text.is_empty() {
            out.push((String::new(), style));
            continue;
        }

        for raw_line in entry.text.split('\n') {
            if raw_line.is_empty() {
                out.push((String::new(), style));
                continue;
            }

            let segments = wrap(raw_line, effective_width);
            if segments.is_empty() {
                out.push((String::new(), style));
            } else {
                out.extend(segments.into_iter().map(|seg| (seg.into_owned(), style)));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_lines_wrap_and_keep_their_style() {
        let style = Style::default().fg(Color::Red);
        let lines = vec![
            TranscriptLine::new("alpha beta gamma".into(), style),
            TranscriptLine::new(String::new(), Style::default()),
        ];
        let wrapped = wrap_transcript(&lines, 10);
        let texts: Vec<&str> = wrapped.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["alpha beta", "gamma", ""]);
        assert_eq!(wrapped[1].1, style);
    }

    #[test]
    fn status_shows_running_keyword_and_key_marks() {
        let status = StatusSnap {
            spinner: "⠋",
            running: Some(("solar".into(), 12)),
            model: "gpt-4.1".into(),
            keys: vec![KeyReport {
                name: "SERPER_API_KEY",
                status: KeyStatus::Missing,
            }],
        };
        let text: String = status_spans(&status)
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(text, " ⠋ Generating 'solar' 12s • gpt-4.1 • ✗ SERPER_API_KEY");
    }

    #[test]
    fn caret_column_counts_display_width() {
        assert_eq!(visual_caret_col("ab", 1), 1);
        assert_eq!(visual_caret_col("日本", "日".len()), 2);
    }
}
