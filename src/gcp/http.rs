//! HTTP utilities for GCP REST API calls

use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Base delay between retry attempts; grows linearly with the attempt number
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Transport-level error for a single API call.
///
/// Handlers match on `is_not_found` to turn a 404 into drift removal instead
/// of a failure, and the retry loop matches on `is_retryable`.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed: {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to parse response JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

impl HttpError {
    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Transport(err) => err.status().map(|s| s.as_u16()),
            HttpError::Decode(_) => None,
        }
    }

    /// True for a 404-class response; callers translate this into
    /// "resource removed" rather than an apply failure.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Retryable classes: quota (429) and transient server errors, plus
    /// connect/timeout failures that never produced a response.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Status { status, .. } => matches!(status, 429 | 500 | 503),
            HttpError::Transport(err) => err.is_timeout() || err.is_connect(),
            HttpError::Decode(_) => false,
        }
    }
}

/// Sanitize response body for logging
/// Truncates long responses and masks potentially sensitive patterns
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        // back off to a char boundary so multibyte text cannot split
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..end],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull the human-readable message out of a GCP error body
/// (`{"error": {"code": ..., "message": ...}}`), falling back to the
/// sanitized raw body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(message) = parsed
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }
    sanitize_for_log(body)
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry_attempts: u32,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(retry_attempts: u32) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(concat!("gcpsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            retry_attempts: retry_attempts.max(1),
        })
    }

    /// Issue a request, retrying the retryable error classes (429 quota,
    /// transient 5xx, connect/timeout) up to the configured attempt cap.
    ///
    /// Retries happen only here at the transport layer; pagination and the
    /// resource handlers above never retry on their own.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HttpError> {
        let mut attempt = 1;
        loop {
            match self.request_once(method.clone(), url, token, body, timeout).await {
                Err(err) if err.is_retryable() && attempt < self.retry_attempts => {
                    let delay = RETRY_BASE_DELAY * attempt;
                    tracing::warn!(
                        "retryable error on {} {} (attempt {}/{}): {}",
                        method,
                        url,
                        attempt,
                        self.retry_attempts,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn request_once(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HttpError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .timeout(timeout);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status();
        let response_body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(HttpError::Status {
                status: status.as_u16(),
                message: error_message(&response_body),
            });
        }

        // Handle empty response
        if response_body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body).map_err(HttpError::Decode)
    }

    pub async fn get(&self, url: &str, token: &str, timeout: Duration) -> Result<Value, HttpError> {
        self.request(Method::GET, url, token, None, timeout).await
    }

    pub async fn post(
        &self,
        url: &str,
        token: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HttpError> {
        self.request(Method::POST, url, token, body, timeout).await
    }

    pub async fn patch(
        &self,
        url: &str,
        token: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HttpError> {
        self.request(Method::PATCH, url, token, body, timeout).await
    }

    pub async fn delete(&self, url: &str, token: &str, timeout: Duration) -> Result<Value, HttpError> {
        self.request(Method::DELETE, url, token, None, timeout).await
    }
}
