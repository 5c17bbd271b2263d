//! Error types for oracle calls.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while calling the analysis oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// The endpoint that failed.
        endpoint: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The call did not complete within the per-call timeout.
    #[error("oracle call timed out after {}ms", after.as_millis())]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// Non-success HTTP response.
    #[error("oracle returned HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The oracle answered, but not with a JSON object.
    #[error("malformed oracle reply: {reason}")]
    MalformedReply {
        /// What was wrong with the reply.
        reason: String,
    },

    /// The oracle cannot be used at all (missing credentials, bad endpoint).
    #[error("oracle misconfigured: {reason}")]
    Configuration {
        /// What is missing or invalid.
        reason: String,
    },
}

impl OracleError {
    /// Creates a network error from a reqwest error.
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Creates an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16) -> Self {
        Self::HttpStatus {
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    #[must_use]
    pub fn http_status_with_retry_after(status: u16, retry_after: Option<String>) -> Self {
        Self::HttpStatus {
            status,
            retry_after,
        }
    }

    /// Creates a malformed reply error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReply {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
