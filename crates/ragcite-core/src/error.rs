//! Error taxonomy.
//!
//! Collaborator traits return `anyhow::Result`. Providers that talk to a
//! remote service raise an [`UpstreamError`] inside the `anyhow::Error` so
//! callers can tell a retryable rate limit apart from a fatal failure via
//! [`is_transient`]. The pipeline reports failures to its callers as
//! [`RagError`].

use thiserror::Error;

/// Failure reported by a remote collaborator (embedder, reranker, generator).
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP 429 or a quota/rate-limit message. Retried with backoff.
    #[error("{service} rate limited: {message}")]
    RateLimited { service: String, message: String },

    /// Credential absent from the environment.
    #[error("{service} credential missing: {env_var} is not set")]
    MissingCredential { service: String, env_var: String },

    /// Non-2xx, non-429 HTTP status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{service} returned a malformed response: {message}")]
    Malformed { service: String, message: String },

    /// Connection refused, DNS failure, timeout.
    #[error("{service} unreachable: {message}")]
    Transport { service: String, message: String },
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }
}

/// Whether an error chain carries a transient upstream condition.
///
/// Looks for [`UpstreamError::RateLimited`] anywhere in the chain and, for
/// errors raised by third-party code, for `rate limit` / `rate_limit` /
/// `quota` in the message.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if err
        .chain()
        .filter_map(|e| e.downcast_ref::<UpstreamError>())
        .any(UpstreamError::is_rate_limited)
    {
        return true;
    }
    let msg = format!("{:#}", err).to_lowercase();
    msg.contains("rate limit") || msg.contains("rate_limit") || msg.contains("quota")
}

/// Failures the pipeline surfaces to its callers.
#[derive(Debug, Error)]
pub enum RagError {
    /// Empty text, empty question, bad parameters.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Rate limited and still failing after the retry ceiling.
    #[error("upstream rate limit persisted after {attempts} attempts: {message}")]
    UpstreamTransient { attempts: u32, message: String },

    /// Auth failure, malformed response, outage. Not retried.
    #[error("upstream failure: {0}")]
    UpstreamFatal(String),

    #[error("vector index error: {0}")]
    Index(String),
}

impl RagError {
    /// Short machine-readable code, e.g. for structured responses.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::InvalidInput(_) => "invalid_input",
            RagError::DocumentNotFound(_) => "not_found",
            RagError::UpstreamTransient { .. } => "upstream_transient",
            RagError::UpstreamFatal(_) => "upstream_fatal",
            RagError::Index(_) => "index",
        }
    }
}
