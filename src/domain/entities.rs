//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{error::DomainError, slug::is_valid_slug, types::PostStatus};

/// A stored post as read back from the `posts` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub status: PostStatus,
    pub ai_writer: String,
    pub ai_editor: String,
    pub system_alert: Option<String>,
    pub integrity_scan: Option<f64>,
    pub fact_check: Option<String>,
    pub editorial_action: Option<String>,
    pub editorial_note: Option<String>,
    pub seo_keywords: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// A fully normalised post ready to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub source_url: Option<String>,
    pub status: PostStatus,
    pub ai_writer: String,
    pub ai_editor: String,
    pub system_alert: Option<String>,
    pub integrity_scan: Option<f64>,
    pub fact_check: Option<String>,
    pub editorial_action: Option<String>,
    pub editorial_note: Option<String>,
    pub seo_keywords: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl NewPost {
    /// Check the invariants a row must satisfy before it reaches the store.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !is_valid_slug(&self.slug) {
            return Err(DomainError::invalid_slug(&self.slug));
        }

        if self.status == PostStatus::Published {
            if self.title.trim().is_empty() {
                return Err(DomainError::Incomplete { field: "a title" });
            }
            if self.content.trim().is_empty() {
                return Err(DomainError::Incomplete { field: "content" });
            }
            if self.published_at.is_none() {
                return Err(DomainError::Incomplete {
                    field: "a publication time",
                });
            }
        }

        Ok(())
    }
}
