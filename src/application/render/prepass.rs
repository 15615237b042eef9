//! Text rewrites applied before markdown parsing.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::util::text::normalize_escaped_newlines;

static SENTINEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\[\[\s*SENTINEL\s*:\s*(?:"([^"\]]*)"|([^\]]*?))\s*\]\]"#)
        .expect("sentinel pattern must compile")
});

/// Replace `[[SENTINEL: "message"]]` markers with `replacement(message)`.
pub(crate) fn replace_sentinels(text: &str, replacement: impl Fn(&str) -> String) -> String {
    SENTINEL_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let message = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            replacement(message)
        })
        .into_owned()
}

pub(crate) fn sentinel_span(message: &str) -> String {
    format!(
        r#"<span class="sentinel-interrupt" data-message="{}"></span>"#,
        escape_attribute(message)
    )
}

/// Normalise escapes and rewrite sentinel markers into inline HTML.
pub(crate) fn prepare(markdown: &str) -> String {
    let normalized = normalize_escaped_newlines(markdown);
    replace_sentinels(&normalized, sentinel_span)
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}
