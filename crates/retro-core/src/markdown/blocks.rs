//! Block classification.
//!
//! Each classifier looks at one blank-line-separated block and either renders
//! it or passes. Classifiers run in a fixed order and the first match wins;
//! a block nothing else claims becomes a paragraph.

use std::sync::LazyLock;

use regex::Regex;

use super::inline::render_inline;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*+]\s+").unwrap());
static ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+\.\s+").unwrap());
static QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>\s?").unwrap());

/// A block classifier: `Some(html)` when it claims the block.
type Classifier = fn(&str, &[&str]) -> Option<String>;

/// Priority order of the block classifiers.
const CLASSIFIERS: &[Classifier] = &[
    heading,
    bullet_list,
    ordinal_list,
    blockquote,
    numbered_narrative,
    title_description_narrative,
];

/// Renders one block (already trimmed, never a code placeholder).
pub(super) fn render_block(block: &str) -> String {
    let lines: Vec<&str> = block.split('\n').collect();
    CLASSIFIERS
        .iter()
        .find_map(|classify| classify(block, &lines))
        .unwrap_or_else(|| paragraph(&lines))
}

fn heading(block: &str, _lines: &[&str]) -> Option<String> {
    let caps = HEADING.captures(block)?;
    let level = caps[1].len();
    Some(format!("<h{level}>{}</h{level}>", render_inline(&caps[2])))
}

fn bullet_list(_block: &str, lines: &[&str]) -> Option<String> {
    list_of(lines, &BULLET)
}

// Ordinal markers are stripped and rendered as an unordered list.
fn ordinal_list(_block: &str, lines: &[&str]) -> Option<String> {
    list_of(lines, &ORDINAL)
}

fn blockquote(_block: &str, lines: &[&str]) -> Option<String> {
    if !lines.iter().all(|line| QUOTE.is_match(line)) {
        return None;
    }
    let quote = lines
        .iter()
        .map(|line| render_inline(&QUOTE.replace(line, "")))
        .collect::<Vec<_>>()
        .join("<br />");
    Some(format!("<blockquote>{quote}</blockquote>"))
}

/// Model output that numbers its points without a blank line around them:
/// an optional lead-in line, the run of numbered lines, then the rest.
fn numbered_narrative(_block: &str, lines: &[&str]) -> Option<String> {
    let lines = non_empty_trimmed(lines);
    if lines.iter().filter(|line| is_numbered(line)).count() < 2 {
        return None;
    }

    let start = usize::from(!is_numbered(lines[0]));
    Some(narrative(&lines, start, is_numbered, |line| {
        ORDINAL.replace(line, "").into_owned()
    }))
}

/// Model output shaped as `Title - description` lines with no bullets, with an
/// optional intro line ending in `:`.
fn title_description_narrative(_block: &str, lines: &[&str]) -> Option<String> {
    let lines = non_empty_trimmed(lines);
    if lines.iter().filter(|line| is_title_desc(line)).count() < 2 {
        return None;
    }

    let start = usize::from(lines[0].ends_with(':'));
    Some(narrative(&lines, start, is_title_desc, str::to_string))
}

fn paragraph(lines: &[&str]) -> String {
    let body = lines
        .iter()
        .map(|line| render_inline(line))
        .collect::<Vec<_>>()
        .join("<br />");
    format!("<p>{body}</p>")
}

fn list_of(lines: &[&str], marker: &Regex) -> Option<String> {
    if !lines.iter().all(|line| marker.is_match(line)) {
        return None;
    }
    let items: String = lines
        .iter()
        .map(|line| format!("<li>{}</li>", render_inline(&marker.replace(line, ""))))
        .collect();
    Some(format!("<ul>{items}</ul>"))
}

/// Lays out `lines` as: `lines[..start]` as a lead-in paragraph, the run of
/// `is_item` lines that follows as a list, and anything after as a paragraph.
fn narrative(
    lines: &[&str],
    start: usize,
    is_item: fn(&str) -> bool,
    item_text: fn(&str) -> String,
) -> String {
    let mut html = String::new();
    if start > 0 {
        html.push_str(&format!("<p>{}</p>", render_inline(lines[0])));
    }

    let run = lines[start..]
        .iter()
        .take_while(|line| is_item(line))
        .count();
    if run > 0 {
        let items: String = lines[start..start + run]
            .iter()
            .map(|line| format!("<li>{}</li>", render_inline(&item_text(line))))
            .collect();
        html.push_str(&format!("<ul>{items}</ul>"));
    }

    let tail = &lines[start + run..];
    if !tail.is_empty() {
        let body = tail
            .iter()
            .map(|line| render_inline(line))
            .collect::<Vec<_>>()
            .join("<br />");
        html.push_str(&format!("<p>{body}</p>"));
    }
    html
}

fn non_empty_trimmed<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect()
}

fn is_numbered(line: &str) -> bool {
    ORDINAL.is_match(line)
}

fn is_title_desc(line: &str) -> bool {
    line.contains(" - ") && !is_numbered(line)
}
