//! Display-ready projections of stored posts.

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    application::render::{MarkdownRenderer, RenderError},
    domain::{
        alert::{ParsedAlert, parse_system_alert},
        entities::PostRecord,
    },
    presentation::media::{ImageResolver, ImageSource},
};

/// Everything a page needs to show one post.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub slug: String,
    pub title: String,
    pub title_html: String,
    pub summary: String,
    pub category: String,
    pub writer: String,
    pub editor: String,
    pub image_url: String,
    pub body_html: String,
    pub plain_text: String,
    pub system_alert: Option<String>,
    pub alert: ParsedAlert,
    pub seo_keywords: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl PostView {
    pub fn build(
        post: &PostRecord,
        renderer: &MarkdownRenderer,
        resolver: &ImageResolver,
    ) -> Result<Self, RenderError> {
        let image_url = resolver.resolve(Some(ImageSource {
            title: &post.title,
            image_url: post.image_url.as_deref(),
        }));

        Ok(Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            title_html: renderer.render_inline(&post.title)?,
            summary: post.summary.clone(),
            category: post.category.clone(),
            writer: post.ai_writer.clone(),
            editor: post.ai_editor.clone(),
            image_url,
            body_html: renderer.render_block(&post.content)?,
            plain_text: renderer.strip_markdown(&post.content),
            system_alert: post.system_alert.clone(),
            alert: display_alert(post),
            seo_keywords: post.seo_keywords.clone(),
            published_at: post.published_at,
        })
    }
}

/// Structured columns win; the free-text alert fills whatever they leave open.
fn display_alert(post: &PostRecord) -> ParsedAlert {
    let parsed = parse_system_alert(post.system_alert.as_deref());
    ParsedAlert {
        integrity: post.integrity_scan.or(parsed.integrity),
        fact_check: post.fact_check.clone().or(parsed.fact_check),
        action: post.editorial_action.clone().or(parsed.action),
    }
}
