use thiserror::Error;

/// A normalised post that must not reach the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("slug `{slug}` is not URL-safe")]
    InvalidSlug { slug: String },
    #[error("published post requires {field}")]
    Incomplete { field: &'static str },
}

impl DomainError {
    pub fn invalid_slug(slug: impl Into<String>) -> Self {
        Self::InvalidSlug { slug: slug.into() }
    }
}
