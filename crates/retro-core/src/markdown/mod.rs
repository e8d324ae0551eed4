//! Markdown-subset to HTML rendering for chat messages.
//!
//! This module provides:
//! - `render()`: block-level rendering of a whole message
//! - `render_inline()`: inline rendering of a single line
//! - `render_document()`: a standalone HTML page around rendered messages
//!
//! The output only ever uses `p`, `h1`-`h6`, `ul`, `li`, `blockquote`, `pre`,
//! `code`, `a`, `strong`, `em` and `br`. Input text is escaped before any
//! pattern runs, so raw `<` and `>` can never produce a tag.

mod blocks;
mod inline;

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub use inline::{escape_html, render_inline};

/// Delimits code-block placeholders between extraction and reassembly.
const PLACEHOLDER: char = '\u{E000}';

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([a-zA-Z0-9_-]+)?\n(.*?)```").unwrap());
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());
static PLACEHOLDER_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^\u{E000}([0-9]+)\u{E000}$").unwrap());
static PLACEHOLDER_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}([0-9]+)\u{E000}").unwrap());

/// A fenced code block lifted out of the text before block parsing.
#[derive(Debug)]
struct CodeBlock {
    language: String,
    /// Already HTML-escaped.
    code: String,
}

/// Renders a chat message to an HTML fragment.
///
/// Never fails: anything that doesn't parse as one of the supported
/// constructs comes out as escaped paragraph text. Empty input renders as a
/// single empty paragraph.
pub fn render(markdown: &str) -> String {
    let normalized: String = markdown
        .replace("\r\n", "\n")
        .chars()
        .filter(|&c| c != PLACEHOLDER)
        .collect();
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return "<p></p>".to_string();
    }

    let mut code_blocks: Vec<CodeBlock> = Vec::new();
    let with_placeholders = FENCE.replace_all(normalized, |caps: &Captures<'_>| {
        code_blocks.push(CodeBlock {
            language: caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            code: escape_html(caps[2].trim_end()),
        });
        format!("{PLACEHOLDER}{}{PLACEHOLDER}", code_blocks.len() - 1)
    });

    let html: String = BLOCK_BREAK
        .split(&with_placeholders)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            if PLACEHOLDER_ONLY.is_match(block) {
                block.to_string()
            } else {
                blocks::render_block(block)
            }
        })
        .collect();

    PLACEHOLDER_ANY
        .replace_all(&html, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| code_blocks.get(idx))
                .map(render_code_block)
                .unwrap_or_default()
        })
        .into_owned()
}

fn render_code_block(block: &CodeBlock) -> String {
    if block.language.is_empty() {
        format!("<pre><code>{}</code></pre>", block.code)
    } else {
        format!(
            r#"<pre><code class="language-{}">{}</code></pre>"#,
            block.language, block.code
        )
    }
}

/// Wraps already-rendered HTML in a minimal standalone page.
pub fn render_document(title: &str, body_html: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body_html
    )
}
