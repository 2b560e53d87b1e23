/// Ollama HTTP client implementation.
///
/// This module provides `OllamaClient` for making synchronous requests to the
/// Ollama API (`/api/generate` and `/api/tags`), along with the error type,
/// the builder, and the retry policy used for transient failures.
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Errors that can occur when interacting with the Ollama API.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Ollama API-specific errors
    #[error("Ollama API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl OllamaError {
    /// Classifies a transport error as a timeout or a network failure.
    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Network(error)
        }
    }
}

/// Adds `http://` to a base URL that has no scheme and drops trailing slashes.
///
/// # Examples
///
/// ```
/// use vellum::ollama::normalize_base_url;
///
/// assert_eq!(normalize_base_url("localhost:11434"), "http://localhost:11434");
/// assert_eq!(normalize_base_url(" https://gpu-box:11434/ "), "https://gpu-box:11434");
/// ```
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Delays between attempts for transient failures.
///
/// The default retries three times after 1s, 2s and 4s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Creates a policy that sleeps for each delay in turn before retrying.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }
}

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vellum::ollama::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .timeout(Duration::from_secs(30))
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.base_url(), "http://localhost:11434");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl OllamaClientBuilder {
    /// Creates a new `OllamaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API.
    ///
    /// A URL without a scheme is accepted and gets `http://` prepended.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-request timeout. Defaults to 120 seconds.
    ///
    /// Generation on a local model can take a while for long documents.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry policy for transient failures.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, this method checks the `OLLAMA_HOST`
    /// environment variable. If not set, it defaults to `http://localhost:11434`.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError::InvalidUrl` if the URL cannot be parsed even after
    /// normalisation, or `OllamaError::Network` if the HTTP client cannot be built.
    pub fn build(self) -> Result<OllamaClient, OllamaError> {
        let raw = match self.base_url {
            Some(url) => url,
            None => std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };

        let base_url = normalize_base_url(&raw);
        if base_url != raw.trim().trim_end_matches('/') {
            tracing::warn!(
                configured = %raw,
                using = %base_url,
                "Ollama URL has no http:// or https:// scheme; auto-corrected"
            );
        }

        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| OllamaError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(OllamaError::InvalidUrl(format!("{base_url}: missing host")));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(OllamaError::Network)?;

        Ok(OllamaClient {
            client,
            base_url,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous HTTP client for the Ollama API.
///
/// Construct it with `OllamaClientBuilder`.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    retry: RetryPolicy,
}

/// The model service as seen by the annotator: one prompt in, one text out.
///
/// Implemented by `OllamaClient`; tests substitute their own implementations.
pub trait OllamaClientTrait: Send + Sync {
    /// Sends `prompt` to `model` and returns the generated text.
    fn generate(&self, model: &str, prompt: &str) -> Result<String, OllamaError>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(default)]
    size: u64,
}

impl OllamaClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists models available on the server, largest first.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError` on transport failures, non-success statuses, or
    /// an unparseable response body.
    pub fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);

        let body = retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(OllamaError::from_transport)?;
            check_status(response.status())?;
            response.text().map_err(OllamaError::from_transport)
        })?;

        let tags: TagsResponse = serde_json::from_str(&body).map_err(OllamaError::Serialization)?;
        let mut models: Vec<(String, u64)> = tags
            .models
            .into_iter()
            .map(|model| (model.name, model.size))
            .collect();
        models.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(models.into_iter().map(|(name, _)| name).collect())
    }

    fn generate_internal(&self, model: &str, prompt: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false
        });

        retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(OllamaError::from_transport)?;
            check_status(response.status())?;

            let body = response.text().map_err(OllamaError::from_transport)?;
            parse_generate_body(&body)
        })
    }
}

impl OllamaClientTrait for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, OllamaError> {
        tracing::debug!(model, prompt_len = prompt.len(), "sending generate request");
        self.generate_internal(model, prompt)
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), OllamaError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(OllamaError::Http {
            status: status.as_u16(),
        })
    }
}

/// Extracts the generated text from an `/api/generate` response body.
fn parse_generate_body(body: &str) -> Result<String, OllamaError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(OllamaError::Serialization)?;

    if let Some(message) = parsed.error {
        return Err(OllamaError::Api { message });
    }
    parsed.response.ok_or_else(|| OllamaError::Api {
        message: "Missing 'response' field in API response".to_string(),
    })
}

/// Runs `f`, retrying transient failures according to `policy`.
///
/// Only network errors, timeouts and HTTP 5xx are retried; everything else
/// is returned immediately. After the last retry the last error is returned.
pub fn retry_with_backoff<F, T>(policy: &RetryPolicy, mut f: F) -> Result<T, OllamaError>
where
    F: FnMut() -> Result<T, OllamaError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in policy.delays.iter().enumerate() {
        tracing::debug!(attempt = attempt + 1, error = %last_error, "retrying Ollama request");
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Returns `true` for transient errors (HTTP 5xx, network errors, timeouts).
fn should_retry(error: &OllamaError) -> bool {
    match error {
        OllamaError::Network(_) | OllamaError::Timeout(_) => true,
        OllamaError::Http { status } => (500..600).contains(status),
        OllamaError::Serialization(_) | OllamaError::Api { .. } | OllamaError::InvalidUrl(_) => {
            false
        }
    }
}
