// src/resolver.rs

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::error::ReconError;

// --- Request descriptors ---

/// One candidate request: method, path relative to the base URL, query, JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new<S: Into<String>>(method: Method, path: S) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<S: Into<String>>(path: S) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<S: Into<String>>(path: S, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put<S: Into<String>>(path: S, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete<S: Into<String>>(path: S) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a query parameter; `None` and empty strings are omitted, never sent blank.
    pub fn param<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(value) = value {
            let value = value.to_string();
            if !value.is_empty() {
                self.query.push((key.into(), value));
            }
        }
        self
    }

    /// Same request under the `/api` prefix.
    pub fn api_prefixed(&self) -> Self {
        Self {
            path: format!("/api{}", self.path),
            ..self.clone()
        }
    }

    /// `GET /path?k=v` form used in logs and error context.
    pub fn describe(&self) -> String {
        if self.query.is_empty() {
            return format!("{} {}", self.method, self.path);
        }
        let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{} {}?{}", self.method, self.path, query.join("&"))
    }
}

// --- Responses and transport ---

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// `204 No Content` (or an empty JSON body).
    Empty,
    Json(Value),
    Text(String),
}

impl ApiResponse {
    /// JSON view of the body: `Null` for empty, parsed text if it happens to be JSON,
    /// else the text as a JSON string.
    pub fn to_json(&self) -> Value {
        match self {
            ApiResponse::Empty => Value::Null,
            ApiResponse::Json(value) => value.clone(),
            ApiResponse::Text(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
        }
    }
}

/// Sends one request descriptor to the backend. Implemented over reqwest by
/// `ApiClient`; tests substitute scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse, ReconError>;
}

/// The candidate that answered and what it returned.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub response: ApiResponse,
    pub request: RequestDescriptor,
    /// 1-based position of the answering candidate.
    pub attempts: usize,
}

// --- Resolution ---

/// Tries `candidates` strictly in order and returns the first success.
///
/// Soft failures (401/403/404/405) move on to the next candidate; any other
/// failure stops resolution and is returned as-is. Exhausting the list yields
/// `NoVariantSucceeded` carrying the last soft failure.
pub async fn resolve(
    transport: &dyn Transport,
    operation: &str,
    candidates: &[RequestDescriptor],
    cancel: &CancelToken,
) -> Result<Resolved, ReconError> {
    resolve_accepting(transport, operation, candidates, cancel, |_| Ok(())).await
}

/// Like [`resolve`], but a successful response that `accept` rejects is treated
/// as a soft miss and resolution continues.
pub async fn resolve_accepting<F>(
    transport: &dyn Transport,
    operation: &str,
    candidates: &[RequestDescriptor],
    cancel: &CancelToken,
    accept: F,
) -> Result<Resolved, ReconError>
where
    F: Fn(&ApiResponse) -> Result<(), String>,
{
    if candidates.is_empty() {
        return Err(ReconError::Config(format!(
            "No candidate endpoints for '{}'",
            operation
        )));
    }

    let mut last_soft: Option<ReconError> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let attempt = index + 1;
        debug!(
            "Resolving '{}': attempt {}/{} {}",
            operation,
            attempt,
            candidates.len(),
            candidate.describe()
        );

        match cancel.run(transport.send(candidate)).await {
            Ok(response) => match accept(&response) {
                Ok(()) => {
                    info!(
                        "Resolved '{}' via {} (attempt {})",
                        operation,
                        candidate.describe(),
                        attempt
                    );
                    return Ok(Resolved {
                        response,
                        request: candidate.clone(),
                        attempts: attempt,
                    });
                }
                Err(detail) => {
                    warn!(
                        "'{}': {} answered but was rejected: {}",
                        operation,
                        candidate.describe(),
                        detail
                    );
                    last_soft = Some(ReconError::Mismatch {
                        path: candidate.describe(),
                        detail,
                    });
                }
            },
            Err(e) if e.is_soft() => {
                warn!(
                    "'{}': {} soft failure, trying next variant: {}",
                    operation,
                    candidate.describe(),
                    e
                );
                last_soft = Some(e);
            }
            Err(e) => {
                error!(
                    "'{}': {} failed hard, aborting resolution: {}",
                    operation,
                    candidate.describe(),
                    e
                );
                return Err(e);
            }
        }
    }

    Err(ReconError::NoVariantSucceeded {
        operation: operation.to_string(),
        attempts: candidates.len(),
        last: Box::new(last_soft.unwrap_or_else(|| {
            ReconError::Config(format!("No candidate endpoints for '{}'", operation))
        })),
    })
}
