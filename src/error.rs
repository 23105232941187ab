// src/error.rs
//! Error taxonomy for page access and extraction.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a page driver. Surfaced verbatim to callers.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("driver does not support {0}")]
    Unsupported(&'static str),

    #[error("http error: {0}")]
    Http(String),
}

/// Failures of a whole extraction call.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Every strategy came back empty.
    #[error("no data extracted from page")]
    NoData,

    #[error("no content extracted from {url}")]
    NoContent { url: String },

    #[error("parse failure: {0}")]
    Parse(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type ExtractResult<T> = Result<T, ExtractError>;
