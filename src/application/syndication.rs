//! Syndication service for RSS feed generation.
//!
//! This service encapsulates the business logic for generating the feed,
//! keeping the CLI and HTTP layers focused on output handling.

use std::sync::Arc;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc2822};
use tracing::warn;

use crate::application::render::{MarkdownRenderer, RenderError};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::presentation::media::{ImageResolver, ImageSource};

pub const DEFAULT_FEED_LIMIT: u32 = 50;

/// Channel-level metadata.
#[derive(Debug, Clone)]
pub struct FeedChannel {
    pub site_url: String,
    pub title: String,
    pub description: String,
    pub limit: u32,
}

/// Service for generating the RSS feed.
#[derive(Clone)]
pub struct SyndicationService {
    posts: Arc<dyn PostsRepo>,
    renderer: Arc<MarkdownRenderer>,
    resolver: ImageResolver,
    channel: FeedChannel,
}

#[derive(Debug, Error)]
pub enum SyndicationError {
    #[error("failed to list posts: {0}")]
    Posts(String),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<RepoError> for SyndicationError {
    fn from(err: RepoError) -> Self {
        SyndicationError::Posts(err.to_string())
    }
}

impl SyndicationService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        renderer: Arc<MarkdownRenderer>,
        resolver: ImageResolver,
        channel: FeedChannel,
    ) -> Self {
        Self {
            posts,
            renderer,
            resolver,
            channel,
        }
    }

    /// Generate RSS 2.0 feed XML for posts published up to now.
    pub async fn rss_feed(&self) -> Result<String, SyndicationError> {
        self.rss_feed_at(OffsetDateTime::now_utc()).await
    }

    pub async fn rss_feed_at(&self, now: OffsetDateTime) -> Result<String, SyndicationError> {
        let base = normalize_public_site_url(&self.channel.site_url);
        let limit = self.channel.limit.clamp(1, 500);

        let posts = self.posts.list_published(now, limit).await?;

        let mut items = String::new();
        for post in posts
            .iter()
            .filter(|post| post.published_at.is_some_and(|at| at <= now))
        {
            items.push_str(&self.render_item(&base, post)?);
        }

        let build_date = format_rfc2822(now);
        let channel = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\" xmlns:content=\"http://purl.org/rss/1.0/modules/content/\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n    <lastBuildDate>{}</lastBuildDate>\n{}  </channel>\n</rss>\n",
            xml_escape(&self.channel.title),
            base,
            xml_escape(&self.channel.description),
            build_date,
            items
        );

        Ok(channel)
    }

    fn render_item(&self, base: &str, post: &PostRecord) -> Result<String, SyndicationError> {
        let link = format!("{base}posts/{}", post.slug);
        let pub_date = post
            .published_at
            .map(format_rfc2822)
            .unwrap_or_default();
        let body_html = self.renderer.render_block(&post.content)?;
        let image = self.resolver.resolve(Some(ImageSource {
            title: &post.title,
            image_url: post.image_url.as_deref(),
        }));

        let mut item = format!(
            "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid isPermaLink=\"true\">{}</guid>\n      <pubDate>{}</pubDate>\n      <description>{}</description>\n      <content:encoded>{}</content:encoded>\n      <author>{}</author>\n      <dc:creator>{}</dc:creator>\n",
            xml_escape(&post.title),
            xml_escape(&link),
            xml_escape(&link),
            pub_date,
            xml_escape(&post.summary),
            cdata(&body_html),
            xml_escape(&post.ai_writer),
            xml_escape(&post.ai_writer),
        );
        if !post.ai_editor.trim().is_empty() {
            item.push_str(&format!(
                "      <dc:creator>{}</dc:creator>\n",
                xml_escape(&post.ai_editor)
            ));
        }
        for keyword in &post.seo_keywords {
            item.push_str(&format!(
                "      <category>{}</category>\n",
                xml_escape(keyword)
            ));
        }
        item.push_str(&format!(
            "      <enclosure url=\"{}\" length=\"0\" type=\"{}\"/>\n    </item>\n",
            xml_escape(&image),
            guess_image_type(&image)
        ));
        Ok(item)
    }
}

fn format_rfc2822(at: OffsetDateTime) -> String {
    at.format(&Rfc2822).unwrap_or_else(|err| {
        warn!(
            target = "application::syndication",
            error = %err,
            "Falling back to default timestamp formatting"
        );
        at.to_string()
    })
}

fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    format!("{trimmed}/")
}

fn cdata(input: &str) -> String {
    format!("<![CDATA[{}]]>", input.replace("]]>", "]]]]><![CDATA[>"))
}

fn guess_image_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
