//! Markdown rendering for stored post bodies.
//!
//! Rendering is pure: markdown in, sanitised HTML or plain text out. Bodies
//! written by the editorial pass may contain literal `\n` escapes and
//! `[[SENTINEL: "..."]]` interruption markers; both are handled before parsing.

mod config;
mod plain;
mod prepass;

use std::sync::Arc;

use comrak::{Arena, format_html, parse_document};
use once_cell::sync::Lazy;
use thiserror::Error;

use config::{build_sanitizer, default_options};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
}

/// Comrak-based renderer with Ammonia sanitisation.
pub struct MarkdownRenderer {
    options: comrak::Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

static MARKDOWN_RENDERER: Lazy<Arc<MarkdownRenderer>> =
    Lazy::new(|| Arc::new(MarkdownRenderer::new()));

/// Access the shared renderer instance, initialised on first use.
pub fn markdown_renderer() -> Arc<MarkdownRenderer> {
    Arc::clone(&MARKDOWN_RENDERER)
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    /// Render markdown into sanitised block-level HTML.
    pub fn render_block(&self, markdown: &str) -> Result<String, RenderError> {
        let prepared = prepass::prepare(markdown);

        let arena = Arena::new();
        let root = parse_document(&arena, &prepared, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(self.sanitizer.clean(&html).to_string())
    }

    /// Render a short fragment, dropping the single wrapping paragraph if
    /// that is all the markdown produced.
    pub fn render_inline(&self, markdown: &str) -> Result<String, RenderError> {
        let html = self.render_block(markdown)?;
        Ok(unwrap_single_paragraph(&html))
    }

    /// Plain text with headers and emphasis removed, collapsed to one line.
    pub fn strip_markdown(&self, markdown: &str) -> String {
        plain::strip(markdown, &self.options)
    }
}

fn unwrap_single_paragraph(html: &str) -> String {
    let trimmed = html.trim();
    if let Some(inner) = trimmed
        .strip_prefix("<p>")
        .and_then(|rest| rest.strip_suffix("</p>"))
        && !inner.contains("<p>")
    {
        return inner.to_string();
    }
    trimmed.to_string()
}
