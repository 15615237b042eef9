//! System alert extraction.
//!
//! The editorial pass emits a loosely templated status line such as
//! `[SYSTEM ALERT // EDITOR v2] INTEGRITY SCAN: 87% | FACT-CHECK: ... | ACTION: ...`.
//! The text is model-generated, so every field is optional, labels may come in
//! any order and the header may be missing entirely. This module is the only
//! place that degrades that free text into typed fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\[\s*SYSTEM[\s_-]*ALERT\b[^\]]*\]\s*[:|\-–—]*|SYSTEM[\s_-]*ALERT\s*[:|\-–—])\s*",
    )
    .expect("header pattern must compile")
});

static INTEGRITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bINTEGRITY[\s_]*SCAN\s*[:=\-–—]?\s*(\d+(?:\.\d+)?)\s*%?")
        .expect("integrity pattern must compile")
});

// Labels capture the label itself in group 1; anything before it is the
// field boundary that introduced it.
static FACT_CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\bFACT[\s_-]*CHECK\s*[:=]\s*)").expect("fact-check pattern must compile")
});

/// `ACTION`/`NOTE` are ordinary words too, so they only count as labels at the
/// start of the text or right after a field separator.
static ACTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[|/;.,•])\s*((?:ACTION|NOTE)\s*[:=]\s*)")
        .expect("action pattern must compile")
});

/// Any label that terminates a free-text capture.
static NEXT_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\bINTEGRITY[\s_]*SCAN\s*[:=\-–—]?\s*\d|\bFACT[\s_-]*CHECK\s*[:=])|(?:^|[|/;.,•])\s*((?:ACTION|NOTE)\s*[:=])",
    )
    .expect("label pattern must compile")
});

/// Removed fields leave a separator behind so neighbouring labels keep their
/// boundary.
const REMOVED_FIELD: &str = " | ";
const VALUE_TRIM: &[char] = &['|', '/', ';', ',', '•'];
const LEFTOVER_NOISE: &[char] = &['|', '/', ';', ',', '•', '-', '–', '—', ':', '.'];

/// Typed view over a system alert string. Recomputed on every render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedAlert {
    pub integrity: Option<f64>,
    pub fact_check: Option<String>,
    pub action: Option<String>,
}

impl ParsedAlert {
    pub fn is_empty(&self) -> bool {
        self.integrity.is_none() && self.fact_check.is_none() && self.action.is_none()
    }
}

/// Parse an optional alert string into its typed fields. Never fails.
pub fn parse_system_alert(raw: Option<&str>) -> ParsedAlert {
    let Some(raw) = raw else {
        return ParsedAlert::default();
    };

    let mut text = HEADER_RE.replace(raw, "").into_owned();

    let integrity = take_integrity(&mut text);
    let fact_check = take_labeled(&mut text, &FACT_CHECK_RE);
    let mut action = take_labeled(&mut text, &ACTION_RE);

    let leftover = leftover_text(&text);
    if !leftover.is_empty() {
        action = Some(match action {
            Some(existing) => format!("{existing} {leftover}"),
            None => leftover,
        });
    }

    ParsedAlert {
        integrity,
        fact_check,
        action,
    }
}

/// Compose the canonical alert line for the given fields.
///
/// `parse_system_alert(Some(&compose_system_alert(tag, &alert)))` yields `alert`
/// back as long as the free-text fields contain no `LABEL:` of their own after
/// a separator.
pub fn compose_system_alert(editor_tag: &str, alert: &ParsedAlert) -> String {
    let tag = editor_tag.trim();
    let header = if tag.is_empty() {
        "[SYSTEM ALERT]".to_string()
    } else {
        format!("[SYSTEM ALERT // {tag}]")
    };

    let mut parts = Vec::with_capacity(3);
    if let Some(score) = alert.integrity {
        parts.push(format!("INTEGRITY SCAN: {}%", format_score(score)));
    }
    if let Some(fact_check) = alert.fact_check.as_deref() {
        parts.push(format!("FACT-CHECK: {fact_check}"));
    }
    if let Some(action) = alert.action.as_deref() {
        parts.push(format!("ACTION: {action}"));
    }

    if parts.is_empty() {
        header
    } else {
        format!("{header} {}", parts.join(" | "))
    }
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        score.to_string()
    }
}

fn take_integrity(text: &mut String) -> Option<f64> {
    let (range, value) = {
        let captures = INTEGRITY_RE.captures(text)?;
        let whole = captures.get(0)?;
        let value = captures
            .get(1)
            .and_then(|number| number.as_str().parse::<f64>().ok());
        (whole.range(), value)
    };
    text.replace_range(range, REMOVED_FIELD);
    value
}

fn take_labeled(text: &mut String, label: &Regex) -> Option<String> {
    let (start, value_start) = {
        let captures = label.captures(text)?;
        let label = captures.get(1)?;
        (label.start(), label.end())
    };
    let value_end = NEXT_LABEL_RE
        .captures_at(text, value_start)
        .and_then(|next| next.get(1).or_else(|| next.get(2)))
        .map(|next| next.start())
        .unwrap_or(text.len());

    let value = clean_value(&text[value_start..value_end]);
    text.replace_range(start..value_end, REMOVED_FIELD);

    (!value.is_empty()).then_some(value)
}

fn clean_value(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || VALUE_TRIM.contains(&c))
        .to_string()
}

fn leftover_text(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| !token.chars().all(|c| LEFTOVER_NOISE.contains(&c)))
        .collect::<Vec<_>>()
        .join(" ")
}
