//! Error types shared by every sync stage.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can stop an item or a whole run.
///
/// `Config` and `Auth` stop the whole run and `Fetch` stops one entity.
/// `Store` errors are caught per item by the reconciler and counted as
/// failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("fetch from {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("store request failed: {0}")]
    Store(String),
}

impl SyncError {
    pub(crate) fn fetch(url: &str, message: impl Into<String>) -> Self {
        SyncError::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Helper function to classify reqwest error types
pub(crate) fn error_type_str(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection"
    } else if e.is_request() {
        "request/DNS"
    } else if e.is_body() {
        "body"
    } else if e.is_decode() {
        "decode"
    } else if e.is_status() {
        "status"
    } else {
        "unknown"
    }
}
