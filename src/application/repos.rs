//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{NewPost, PostRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Most recent posts by a writer, newest first.
    async fn list_recent_by_writer(
        &self,
        writer: &str,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;

    /// Posts whose `image_url` is still NULL, newest first.
    async fn list_missing_image(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError>;

    /// Published posts visible at `now`, newest first.
    async fn list_published(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<PostRecord, RepoError>;

    /// Link an image reference to a post. Returns [`RepoError::NotFound`] when
    /// the id matches nothing.
    async fn update_image_url(&self, id: i64, image_url: &str) -> Result<(), RepoError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{name}` already exists")]
    AlreadyExists { name: String },
    #[error("storage rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("storage request failed: {0}")]
    Transport(String),
}

/// Where an uploaded object can be found afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub public_url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload without overwriting an existing object of the same name.
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<StoredObject, StorageError>;
}
