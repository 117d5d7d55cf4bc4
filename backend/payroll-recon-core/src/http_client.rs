// src/http_client.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ReconError;
use crate::resolver::{ApiResponse, RequestDescriptor, Transport};

// --- Token providers ---

/// Source of the bearer token. The client asks on every request, so a provider
/// may return a different token over time.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A fixed token, e.g. from `PAYROLL_API_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        non_empty(&self.0)
    }
}

/// First non-empty value among a list of environment variables.
#[derive(Debug, Clone)]
pub struct EnvToken {
    vars: Vec<String>,
}

impl EnvToken {
    pub fn new<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl TokenProvider for EnvToken {
    fn token(&self) -> Option<String> {
        self.vars
            .iter()
            .find_map(|var| std::env::var(var).ok().and_then(|v| non_empty(&v)))
    }
}

/// Asks each provider in turn and uses the first token found.
#[derive(Default)]
pub struct TokenChain {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl TokenChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: TokenProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Explicit token first, then the configured environment variables.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut chain = Self::new();
        if let Some(token) = &config.api_token {
            chain = chain.with(StaticToken(token.clone()));
        }
        chain.with(EnvToken::new(config.token_env_vars.iter().cloned()))
    }
}

impl TokenProvider for TokenChain {
    fn token(&self) -> Option<String> {
        self.providers.iter().find_map(|p| p.token())
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// --- Client ---

/// reqwest-backed transport for the payroll backend.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    http_client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ReconError> {
        let tokens = TokenChain::from_config(&config);
        Self::with_token_provider(config, tokens)
    }

    pub fn with_token_provider<P: TokenProvider + 'static>(
        config: ClientConfig,
        tokens: P,
    ) -> Result<Self, ReconError> {
        config.validate()?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http_client,
            tokens: Arc::new(tokens),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_request(&self, request: &RequestDescriptor) -> Result<RequestBuilder, ReconError> {
        let url = if request.path.starts_with('/') {
            format!("{}{}", self.config.base(), request.path)
        } else {
            format!("{}/{}", self.config.base(), request.path)
        };

        let mut url = Url::parse(&url)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json");

        if let Some(token) = self.tokens.token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse, ReconError> {
        let builder = self.build_request(request)?;
        let context_msg = request.describe();
        debug!("Sending request {}", context_msg);

        let resp = builder.send().await.map_err(|e| {
            error!(
                "HTTP execution failed before receiving response for '{}': {}",
                context_msg, e
            );
            ReconError::Request(e)
        })?;

        let status = resp.status();
        info!("Received response for '{}': Status={}", context_msg, status);
        if status.is_success() {
            decode_success(resp).await
        } else {
            Err(decode_failure(status, resp).await)
        }
    }
}

// --- Response decoding ---

fn is_json(resp: &Response) -> bool {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

async fn decode_success(resp: Response) -> Result<ApiResponse, ReconError> {
    if resp.status() == StatusCode::NO_CONTENT {
        return Ok(ApiResponse::Empty);
    }
    let json = is_json(&resp);
    let text = resp.text().await?;
    if json {
        if text.trim().is_empty() {
            return Ok(ApiResponse::Empty);
        }
        return Ok(ApiResponse::Json(serde_json::from_str(&text)?));
    }
    Ok(ApiResponse::Text(text))
}

async fn decode_failure(status: StatusCode, resp: Response) -> ReconError {
    let text = resp
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
    let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| Value::String(text.clone()));
    let message = error_message(status, &body);
    debug!("API error body (status {}): {}", status, text);
    ReconError::Api {
        status: status.as_u16(),
        message,
        body,
    }
}

/// Human-readable message for a failed response: `detail`, else `message`,
/// else the raw text, else the status reason phrase.
pub fn error_message(status: StatusCode, body: &Value) -> String {
    let from_field = ["detail", "message"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(v @ (Value::Array(_) | Value::Object(_))) => Some(v.to_string()),
            _ => None,
        });
    if let Some(message) = from_field {
        return message;
    }
    match body {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> ApiClient {
        ApiClient::with_token_provider(
            ClientConfig::new("http://localhost:8000/"),
            StaticToken("tok-1".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_build_request_headers_and_query() {
        let request = client()
            .build_request(
                &RequestDescriptor::get("/payroll")
                    .param("employee_id", Some(5))
                    .param("month", Some("2024-03")),
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:8000/payroll?employee_id=5&month=2024-03"
        );
        assert_eq!(request.headers()[ACCEPT], "application/json");
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok-1");
        assert!(request.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_body_sets_content_type() {
        let request = client()
            .build_request(&RequestDescriptor::post("/payroll/late_override", json!({"x": 1})))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_no_token_no_authorization_header() {
        let client = ApiClient::with_token_provider(
            ClientConfig::new("http://localhost:8000"),
            StaticToken("  ".to_string()),
        )
        .unwrap();
        let request = client
            .build_request(&RequestDescriptor::get("logs"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8000/logs");
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_token_chain_order() {
        let chain = TokenChain::new()
            .with(StaticToken(String::new()))
            .with(StaticToken("second".to_string()))
            .with(StaticToken("third".to_string()));
        assert_eq!(chain.token().as_deref(), Some("second"));
        assert_eq!(TokenChain::new().token(), None);
    }

    #[test]
    fn test_error_message_preference() {
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        assert_eq!(
            error_message(status, &json!({"detail": "bad month", "message": "m"})),
            "bad month"
        );
        assert_eq!(error_message(status, &json!({"message": "m"})), "m");
        assert_eq!(error_message(status, &json!("plain text")), "plain text");
        assert_eq!(error_message(status, &json!({})), "Unprocessable Entity");
    }
}
