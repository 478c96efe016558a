//! Inline rich-text markup.
//!
//! Persona bios (and anything else rendered as a document card) use a small
//! line-oriented tag language:
//!
//! ```text
//! Plain lines become paragraphs.
//! > Lines starting with `>` become quotes.
//! [[SYNTAX:rust]] ... [[/SYNTAX]]        fenced code
//! [[COMMAND:deploy]] ... [[/COMMAND]]    a named command block
//! [[CALLOUT:warn]] ... [[/CALLOUT]]      info | warn | success callout
//! `:chip:Gemini`                         an inline chip
//! ```
//!
//! [`parse_blocks`] turns text into a [`Block`] list; [`render_html`] is a
//! pure projection of that list. Neither depends on the other's output format.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutTone {
    Info,
    Warn,
    Success,
}

impl CalloutTone {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "info" => Some(CalloutTone::Info),
            "warn" => Some(CalloutTone::Warn),
            "success" => Some(CalloutTone::Success),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalloutTone::Info => "info",
            CalloutTone::Warn => "warn",
            CalloutTone::Success => "success",
        }
    }
}

/// One parsed block. Text is kept raw; escaping happens at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Paragraph { id: String, text: String },
    Quote { id: String, text: String },
    Code { id: String, lang: String, body: String },
    Command { id: String, name: String, body: String },
    Callout { id: String, tone: CalloutTone, body: String },
}

enum Mode {
    Code(String),
    Command(String),
    Callout(CalloutTone),
}

static OPEN_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[\[SYNTAX:([a-z0-9]+)\]\]$").unwrap());
static CLOSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[\[/SYNTAX\]\]$").unwrap());
static OPEN_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[\[COMMAND:([A-Z0-9_\-]+)\]\]$").unwrap());
static CLOSE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[\[/COMMAND\]\]$").unwrap());
static OPEN_CALLOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[\[CALLOUT:(info|warn|success)\]\]$").unwrap());
static CLOSE_CALLOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[\[/CALLOUT\]\]$").unwrap());
static CHIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`:chip:([^`]+)`").unwrap());

struct Parser<'a> {
    out: Vec<Block>,
    buf: Vec<&'a str>,
    next_id: usize,
}

impl<'a> Parser<'a> {
    fn id(&mut self) -> String {
        self.next_id += 1;
        format!("p-{}", self.next_id)
    }

    fn take_body(&mut self) -> String {
        let body = self.buf.join("\n");
        self.buf.clear();
        body
    }

    /// Emit buffered plain lines as paragraphs and quotes.
    fn flush_paragraph(&mut self) {
        let joined = self.take_body();
        for line in joined.trim().lines() {
            if line.trim().is_empty() {
                continue;
            }
            let id = self.id();
            match line.strip_prefix('>') {
                Some(rest) => {
                    let text = rest.strip_prefix(' ').unwrap_or(rest).to_string();
                    self.out.push(Block::Quote { id, text });
                }
                None => self.out.push(Block::Paragraph {
                    id,
                    text: line.to_string(),
                }),
            }
        }
    }
}

/// Parse markup into blocks. Unterminated blocks fall back to paragraphs.
pub fn parse_blocks(raw: &str) -> Vec<Block> {
    let mut parser = Parser {
        out: Vec::new(),
        buf: Vec::new(),
        next_id: 0,
    };
    let mut mode: Option<Mode> = None;

    for line in raw.lines() {
        if let Some(cap) = OPEN_CODE.captures(line) {
            parser.flush_paragraph();
            mode = Some(Mode::Code(cap[1].to_string()));
            continue;
        }
        if CLOSE_CODE.is_match(line) && matches!(mode, Some(Mode::Code(_))) {
            if let Some(Mode::Code(lang)) = mode.take() {
                let id = parser.id();
                let body = parser.take_body();
                parser.out.push(Block::Code { id, lang, body });
            }
            continue;
        }
        if let Some(cap) = OPEN_COMMAND.captures(line) {
            parser.flush_paragraph();
            mode = Some(Mode::Command(cap[1].to_string()));
            continue;
        }
        if CLOSE_COMMAND.is_match(line) && matches!(mode, Some(Mode::Command(_))) {
            if let Some(Mode::Command(name)) = mode.take() {
                let id = parser.id();
                let body = parser.take_body();
                parser.out.push(Block::Command { id, name, body });
            }
            continue;
        }
        if let Some(tone) = OPEN_CALLOUT
            .captures(line)
            .and_then(|cap| CalloutTone::parse(&cap[1]))
        {
            parser.flush_paragraph();
            mode = Some(Mode::Callout(tone));
            continue;
        }
        if CLOSE_CALLOUT.is_match(line) && matches!(mode, Some(Mode::Callout(_))) {
            if let Some(Mode::Callout(tone)) = mode.take() {
                let id = parser.id();
                let body = parser.take_body();
                parser.out.push(Block::Callout { id, tone, body });
            }
            continue;
        }

        parser.buf.push(line);
    }
    parser.flush_paragraph();
    parser.out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text and turn `` `:chip:Label` `` spans into chip markup.
fn inline_html(text: &str) -> String {
    let escaped = escape_html(text);
    CHIP.replace_all(&escaped, r#"<span class="neon-chip">$1</span>"#).into_owned()
}

/// Render blocks to HTML.
pub fn render_html(blocks: &[Block]) -> String {
    let mut html = String::new();
    for block in blocks {
        match block {
            Block::Paragraph { id, text } => {
                html.push_str(&format!(r#"<div id="{id}" class="p">{}</div>"#, inline_html(text)));
            }
            Block::Quote { id, text } => {
                html.push_str(&format!(
                    r#"<blockquote id="{id}" class="neon-quote p">{}</blockquote>"#,
                    inline_html(text)
                ));
            }
            Block::Code { id, lang, body } => {
                html.push_str(&format!(
                    r#"<div id="{id}" class="neon-code p"><div class="lang">{}</div><pre><code>{}</code></pre></div>"#,
                    escape_html(&lang.to_uppercase()),
                    escape_html(body)
                ));
            }
            Block::Command { id, name, body } => {
                html.push_str(&format!(
                    r#"<div id="{id}" class="neon-code p"><div class="lang">COMMAND: {}</div><pre><code>{}</code></pre></div>"#,
                    escape_html(name),
                    escape_html(body)
                ));
            }
            Block::Callout { id, tone, body } => {
                html.push_str(&format!(
                    r#"<div id="{id}" class="neon-callout p {tone}"><strong>{tone}</strong><div>{}</div></div>"#,
                    escape_html(body),
                    tone = tone.as_str()
                ));
            }
        }
    }
    html
}
