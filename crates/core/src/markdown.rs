use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(.*?)```").expect("fenced code pattern is valid"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+)`").expect("inline code pattern is valid"));
static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("italic pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escaping {
    /// `&`, `<`, `>` and `"`.
    Standard,
    /// Also escapes `'`.
    #[default]
    Strict,
}

pub fn escape_html(value: &str) -> String {
    escape_with(value, Escaping::Strict)
}

pub fn escape_with(value: &str, escaping: Escaping) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' if escaping == Escaping::Strict => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Markup already produced by a step, never rescanned, versus escaped text still open to later steps.
enum Segment {
    Markup(String),
    Text(String),
}

/// Minimal markdown subset: fenced code, inline code, bold, italic, line breaks.
///
/// Input is escaped first. Code is opaque once produced: later steps never
/// rewrite it, so asterisks inside code spans stay literal. Italic markers
/// inside bold text are still honoured. Fenced blocks keep their newlines
/// raw inside `<pre>`; inline code turns them into `<br>` like plain text.
/// Unmatched markers are left as (escaped) text.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer {
    pub escaping: Escaping,
}

impl MarkdownRenderer {
    pub fn new(escaping: Escaping) -> Self {
        Self { escaping }
    }

    pub fn render(&self, text: &str) -> String {
        let segments = vec![Segment::Text(escape_with(text, self.escaping))];
        let segments = substitute(segments, &FENCED_CODE, |inner| {
            format!("<pre><code>{inner}</code></pre>")
        });
        let segments = substitute(segments, &INLINE_CODE, |inner| {
            format!("<code>{}</code>", inner.replace('\n', "<br>"))
        });
        let segments = substitute(segments, &BOLD, |inner| {
            format!("<strong>{}</strong>", ITALIC.replace_all(inner, "<em>$1</em>"))
        });
        let segments = substitute(segments, &ITALIC, |inner| format!("<em>{inner}</em>"));

        segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Markup(markup) => markup,
                Segment::Text(text) => text.replace('\n', "<br>"),
            })
            .collect()
    }
}

pub fn render_markdown(text: &str) -> String {
    MarkdownRenderer::default().render(text)
}

fn substitute(
    segments: Vec<Segment>,
    pattern: &Regex,
    wrap: impl Fn(&str) -> String,
) -> Vec<Segment> {
    let mut output = Vec::with_capacity(segments.len());

    for segment in segments {
        let text = match segment {
            Segment::Text(text) => text,
            markup => {
                output.push(markup);
                continue;
            }
        };

        let mut cursor = 0;
        for captures in pattern.captures_iter(&text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let inner = captures.get(1).map_or("", |inner| inner.as_str());

            if whole.start() > cursor {
                output.push(Segment::Text(text[cursor..whole.start()].to_string()));
            }
            output.push(Segment::Markup(wrap(inner)));
            cursor = whole.end();
        }

        if cursor < text.len() {
            output.push(Segment::Text(text[cursor..].to_string()));
        }
    }

    output
}
