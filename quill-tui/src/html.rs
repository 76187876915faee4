//! Flatten article HTML into styled terminal lines.
//!
//! Only the tags an article uses are interpreted: headings, paragraphs, lists,
//! block quotes, preformatted text, line breaks and links. Everything else
//! contributes its text.
use scraper::{ElementRef, Html, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Text,
    Bullet,
    Quote,
    Code,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlLine {
    pub kind: LineKind,
    pub text: String,
}

/// Render an HTML fragment as lines of plain text.
///
/// ```
/// use quill_tui::html::{html_to_lines, LineKind};
///
/// let lines = html_to_lines("<h1>Solar</h1><p>Panels <strong>work</strong>.</p>");
/// assert_eq!(lines[0].kind, LineKind::Heading(1));
/// assert_eq!(lines[0].text, "Solar");
/// assert_eq!(lines[2].text, "Panels work.");
/// ```
pub fn html_to_lines(html: &str) -> Vec<HtmlLine> {
    let doc = Html::parse_fragment(html);
    let mut r = Renderer::default();
    r.walk(doc.root_element());
    r.flush();
    while r.lines.last().is_some_and(|l| l.kind == LineKind::Blank) {
        r.lines.pop();
    }
    r.lines
}

#[derive(Default)]
struct Renderer {
    lines: Vec<HtmlLine>,
    current: String,
    kind: Option<LineKind>,
    /// One entry per open list: `None` for `<ul>`, `Some(n)` for the next `<ol>` number.
    lists: Vec<Option<usize>>,
    in_pre: bool,
}

impl Renderer {
    fn walk(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        match name {
            "script" | "style" | "head" | "title" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                self.block(LineKind::Heading(level), el);
                self.blank();
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "tr" => {
                self.block(LineKind::Text, el);
                if matches!(name, "p") {
                    self.blank();
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.push((name == "ol").then_some(1));
                self.walk(el);
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            "li" => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{n}. ");
                        *n += 1;
                        m
                    }
                    _ => "• ".to_string(),
                };
                let depth = self.lists.len().saturating_sub(1);
                self.current = format!("{}{marker}", "  ".repeat(depth));
                self.kind = Some(LineKind::Bullet);
                self.walk(el);
                self.flush();
            }
            "blockquote" => {
                self.block(LineKind::Quote, el);
                self.blank();
            }
            "pre" => {
                self.flush();
                self.in_pre = true;
                self.kind = Some(LineKind::Code);
                self.walk(el);
                self.in_pre = false;
                self.flush();
                self.blank();
            }
            "br" => self.flush(),
            "hr" => {
                self.flush();
                self.push(LineKind::Text, "─".repeat(24));
            }
            "a" => {
                let before = self.current.len();
                self.walk(el);
                let label = self.current.get(before..).unwrap_or_default().trim().to_string();
                if let Some(href) = el.value().attr("href").map(str::trim) {
                    if !href.is_empty() && label != href {
                        if label.is_empty() {
                            self.append(href);
                        } else {
                            self.append(&format!("({href})"));
                        }
                    }
                }
            }
            _ => self.walk(el),
        }
    }

    fn block(&mut self, kind: LineKind, el: ElementRef<'_>) {
        self.flush();
        self.kind = Some(kind);
        self.walk(el);
        self.flush();
    }

    fn text(&mut self, text: &str) {
        if self.in_pre {
            let mut parts = text.split('\n');
            if let Some(first) = parts.next() {
                self.current.push_str(first);
            }
            for part in parts {
                self.flush_raw();
                self.kind = Some(LineKind::Code);
                self.current.push_str(part);
            }
            return;
        }
        let starts_with_space = text.starts_with(char::is_whitespace);
        let mut words = text.split_whitespace().peekable();
        if words.peek().is_none() {
            if starts_with_space {
                self.space();
            }
            return;
        }
        if starts_with_space {
            self.space();
        }
        let collapsed: Vec<&str> = words.collect();
        self.current.push_str(&collapsed.join(" "));
        if text.ends_with(char::is_whitespace) {
            self.space();
        }
    }

    fn append(&mut self, s: &str) {
        self.space();
        self.current.push_str(s);
    }

    fn space(&mut self) {
        if !self.current.is_empty() && !self.current.ends_with(' ') {
            self.current.push(' ');
        }
    }

    fn flush(&mut self) {
        if self.in_pre {
            self.flush_raw();
            return;
        }
        let text = self.current.trim().to_string();
        self.current.clear();
        let kind = self.kind.take().unwrap_or(LineKind::Text);
        let is_marker_only = kind == LineKind::Bullet
            && text.trim_start_matches(|c: char| c == '•' || c.is_ascii_digit() || c == '.')
                .trim()
                .is_empty();
        if !text.is_empty() && !is_marker_only {
            self.push(kind, text);
        }
    }

    fn flush_raw(&mut self) {
        let text = std::mem::take(&mut self.current);
        let kind = self.kind.take().unwrap_or(LineKind::Code);
        self.push(kind, text.trim_end().to_string());
    }

    fn blank(&mut self) {
        if self
            .lines
            .last()
            .is_some_and(|l| l.kind != LineKind::Blank)
        {
            self.push(LineKind::Blank, String::new());
        }
    }

    fn push(&mut self, kind: LineKind, text: String) {
        self.lines.push(HtmlLine { kind, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[HtmlLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn article_structure_is_preserved() {
        let html = r#"<h1>Community Solar</h1>
<p>Shared arrays let <em>renters</em> subscribe.</p>
<h2>Sources</h2>
<ul><li><a href="https://a.example/guide">Guide</a></li><li><a href="https://b.example">https://b.example</a></li></ul>"#;
        let lines = html_to_lines(html);

        assert_eq!(
            texts(&lines),
            vec![
                "Community Solar",
                "",
                "Shared arrays let renters subscribe.",
                "",
                "Sources",
                "",
                "• Guide (https://a.example/guide)",
                "• https://b.example",
            ]
        );
        assert_eq!(lines[0].kind, LineKind::Heading(1));
        assert_eq!(lines[4].kind, LineKind::Heading(2));
        assert_eq!(lines[6].kind, LineKind::Bullet);
    }

    #[test]
    fn ordered_lists_are_numbered() {
        let lines = html_to_lines("<ol><li>One</li><li>Two</li></ol>");
        assert_eq!(texts(&lines), vec!["1. One", "2. Two"]);
    }

    #[test]
    fn preformatted_text_keeps_line_breaks() {
        let lines = html_to_lines("<pre>fn main() {\n    run();\n}</pre>");
        assert_eq!(texts(&lines), vec!["fn main() {", "    run();", "}"]);
        assert!(lines.iter().all(|l| l.kind == LineKind::Code));
    }

    #[test]
    fn plain_text_becomes_a_single_line() {
        let lines = html_to_lines("Sorry, no   sources.");
        assert_eq!(texts(&lines), vec!["Sorry, no sources."]);
    }

    #[test]
    fn scripts_are_dropped() {
        let lines = html_to_lines("<p>Keep</p><script>alert(1)</script>");
        assert_eq!(texts(&lines), vec!["Keep"]);
    }
}
