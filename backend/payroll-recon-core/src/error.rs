// src/error.rs

use serde_json::Value;
use thiserror::Error;

/// Status codes that mean "this endpoint shape does not apply here" during
/// endpoint discovery. Anything else is a real failure.
pub const SOFT_STATUSES: [u16; 4] = [401, 403, 404, 405];

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    // Non-2xx from the backend. `body` is the parsed JSON body, or the raw text as a JSON string.
    #[error("Backend API error: Status={status}, Message='{message}'")]
    Api {
        status: u16,
        message: String,
        body: Value,
    },

    #[error("No endpoint variant succeeded for '{operation}' after {attempts} attempt(s): {last}")]
    NoVariantSucceeded {
        operation: String,
        attempts: usize,
        last: Box<ReconError>,
    },

    // A 2xx answer whose payload is not what the operation asked for (e.g. another month).
    #[error("Response from {path} rejected: {detail}")]
    Mismatch { path: String, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReconError {
    /// True for failures that only tell us the candidate endpoint does not exist
    /// (or is not ours to call). The resolver moves on to the next candidate.
    pub fn is_soft(&self) -> bool {
        match self {
            ReconError::Api { status, .. } => SOFT_STATUSES.contains(status),
            _ => false,
        }
    }

    /// HTTP status carried by the error, looking through an exhausted resolution.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReconError::Api { status, .. } => Some(*status),
            ReconError::Request(e) => e.status().map(|s| s.as_u16()),
            ReconError::NoVariantSucceeded { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Parsed response body attached to an API error, if any.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ReconError::Api { body, .. } => Some(body),
            ReconError::NoVariantSucceeded { last, .. } => last.body(),
            _ => None,
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        ReconError::Validation(message.into())
    }
}

// Helper to create context-aware IO errors
pub(crate) fn io_context<E: Into<std::io::Error>, S: Into<String>>(
    source: E,
    context: S,
) -> ReconError {
    ReconError::Io {
        source: source.into(),
        context: context.into(),
    }
}
