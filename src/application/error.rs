use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use url::Url;

use crate::{config::LoadError, infra::error::InfraError};

use super::filter::FilterError;

/// The configured calendar a failed request was for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedContext {
    pub path: String,
    pub origin: Url,
}

/// Diagnostic attached to error responses and logged by the response middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
    pub feed: Option<FeedContext>,
}

impl ErrorReport {
    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
            feed: None,
        }
    }

    pub fn for_feed(mut self, path: &str, origin: &Url) -> Self {
        self.feed = Some(FeedContext {
            path: path.to_string(),
            origin: origin.clone(),
        });
        self
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Messages of `error` and each of its sources, outermost first.
pub fn error_messages(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

/// The error chain of `error` on one line.
pub fn error_chain(error: &dyn StdError) -> String {
    error_messages(error).join(": ")
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    /// Name the calendar this error was served for, so response logs carry the feed.
    pub fn for_feed(mut self, path: &str, origin: &Url) -> Self {
        self.report = self.report.for_feed(path, origin);
        self
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Process-level failures surfaced by the binary's commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration")]
    Config(#[from] LoadError),
    #[error("calendar could not be filtered")]
    Filter(#[from] FilterError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
