//! Inline Markdown: escaping, links, code spans, strong and emphasis.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Delimits stashed inline fragments (anchors, code spans) while emphasis runs.
const STASH: char = '\u{E001}';

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").unwrap());
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static STRONG_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static STRONG_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_]+)__").unwrap());
static EM_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static EM_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_([^_\n]+)_").unwrap());
static STASHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E001}([0-9]+)\u{E001}").unwrap());

/// Escapes the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Renders one fragment of inline Markdown to HTML.
///
/// Escaping happens before any substitution, so markup in `text` can never
/// survive as a tag. Links and code spans are substituted first and set
/// aside, which keeps `*` and `_` inside them from turning into emphasis.
pub fn render_inline(text: &str) -> String {
    let cleaned: String = text.chars().filter(|&c| c != STASH).collect();
    let html = escape_html(&cleaned);

    let mut stash: Vec<String> = Vec::new();
    let html = LINK.replace_all(&html, |caps: &Captures<'_>| {
        stash_fragment(
            &mut stash,
            format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                &caps[2], &caps[1]
            ),
        )
    });
    let html = CODE.replace_all(&html, |caps: &Captures<'_>| {
        stash_fragment(&mut stash, format!("<code>{}</code>", &caps[1]))
    });

    let html = STRONG_STAR.replace_all(&html, "<strong>${1}</strong>");
    let html = STRONG_UNDERSCORE.replace_all(&html, "<strong>${1}</strong>");
    let html = EM_STAR.replace_all(&html, "<em>${1}</em>");
    let html = EM_UNDERSCORE.replace_all(&html, "<em>${1}</em>");

    STASHED
        .replace_all(&html, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| stash.get(idx))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn stash_fragment(stash: &mut Vec<String>, fragment: String) -> String {
    stash.push(fragment);
    format!("{STASH}{}{STASH}", stash.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_all_five() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn test_script_tag_is_escaped() {
        let html = render_inline("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_link_gets_safe_attributes() {
        let html = render_inline("see [docs](https://example.com/a)");
        assert_eq!(
            html,
            r#"see <a href="https://example.com/a" target="_blank" rel="noopener noreferrer">docs</a>"#
        );
    }

    #[test]
    fn test_non_http_link_is_left_alone() {
        let html = render_inline("[x](javascript:alert(1))");
        assert!(!html.contains("<a"));
        assert_eq!(html, "[x](javascript:alert(1))");
    }

    #[test]
    fn test_underscores_in_url_are_not_emphasis() {
        let html = render_inline("[a](https://example.com/snake_case_path)");
        assert!(html.contains(r#"href="https://example.com/snake_case_path""#));
        assert!(!html.contains("<em>"));
    }

    #[test]
    fn test_code_span_keeps_delimiters() {
        let html = render_inline("run `a*b*c` now");
        assert_eq!(html, "run <code>a*b*c</code> now");
    }

    #[test]
    fn test_strong_and_emphasis() {
        assert_eq!(render_inline("**bold**"), "<strong>bold</strong>");
        assert_eq!(render_inline("__bold__"), "<strong>bold</strong>");
        assert_eq!(render_inline("*it*"), "<em>it</em>");
        assert_eq!(render_inline("_it_"), "<em>it</em>");
        assert_eq!(
            render_inline("**a** and *b*"),
            "<strong>a</strong> and <em>b</em>"
        );
    }

    #[test]
    fn test_unbalanced_delimiters_stay_literal() {
        assert_eq!(render_inline("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(render_inline("**open"), "**open");
    }

    #[test]
    fn test_stash_marker_in_input_is_dropped() {
        let html = render_inline("x\u{E001}0\u{E001}y `c`");
        assert_eq!(html, "x0y <code>c</code>");
    }
}
