/// Ollama HTTP client module.
///
/// The annotator depends only on `OllamaClientTrait`; `OllamaClient` is the
/// blocking HTTP implementation with timeouts and retry on transient errors.
mod client;

pub use client::{
    DEFAULT_BASE_URL, OllamaClient, OllamaClientBuilder, OllamaClientTrait, OllamaError,
    RetryPolicy, normalize_base_url, retry_with_backoff,
};
