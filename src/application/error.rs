use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        content::ContentError, render::RenderError, repos::RepoError,
        syndication::SyndicationError, visualize::VisualizeError,
    },
    config::LoadError,
    infra::error::InfraError,
};

/// Process exit code for operator mistakes such as an unknown persona key.
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Visualize(#[from] VisualizeError),
    #[error(transparent)]
    Syndication(#[from] SyndicationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("{failed} of {total} post(s) could not be visualized")]
    IncompleteBatch { failed: usize, total: usize },
    #[error("resource not found")]
    NotFound,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Exit code the CLI terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Content(err) if err.is_usage() => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Repo(RepoError::NotFound) | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Repo(RepoError::Timeout)
            | AppError::Syndication(SyndicationError::Posts(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "Resource not found",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            _ => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::content::select_persona;

    #[test]
    fn unknown_persona_exits_with_usage_code() {
        let err = AppError::from(select_persona(Some("ghost")).expect_err("unknown"));
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn other_failures_exit_with_one() {
        let err = AppError::IncompleteBatch {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert_eq!(
            AppError::from(RepoError::Timeout).exit_code(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
