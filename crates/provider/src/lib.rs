//! Provider abstraction for upstream model API calls
//!
//! Defines the `Provider` trait that decouples the distillation pipeline from a
//! specific model vendor. A provider performs exactly one call with one API key
//! and reports either a response or a structured `ProviderError`. The error
//! exposes an opaque `Signal` (HTTP status + body, a local transport or decode
//! failure, or a vendor message) which the key pool classifies into a
//! `FailureClass` without learning the vendor's error vocabulary itself.

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Semantic outcome of a failed upstream call, used to drive key rotation.
///
/// - QuotaExceeded puts the key into cooldown and rotates to the next key
/// - Transient counts against the key and is retried
/// - Fatal counts against the key and is not retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Rate or usage limit hit for this key
    QuotaExceeded,
    /// Recognized, retryable failure (timeouts, 5xx, malformed responses)
    Transient,
    /// Unrecognized failure, never treated as a quota event
    Fatal,
}

impl FailureClass {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureClass::QuotaExceeded => "quota_exceeded",
            FailureClass::Transient => "transient",
            FailureClass::Fatal => "fatal",
        }
    }
}

/// Raw failure signal as observed at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Upstream answered with a non-success HTTP status
    Status { code: u16, body: String },
    /// Request never produced an HTTP response (timeout, refused, reset)
    Transport(String),
    /// Response arrived but its content could not be used
    Malformed(String),
    /// Failure described only by a vendor or SDK message
    Message(String),
}

/// Errors from a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// The signal handed to the failure classifier.
    pub fn signal(&self) -> Signal {
        match self {
            ProviderError::Upstream { status, body } => Signal::Status {
                code: *status,
                body: body.clone(),
            },
            ProviderError::Transport(message) => Signal::Transport(message.clone()),
            ProviderError::Decode(message) => Signal::Malformed(message.clone()),
        }
    }
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// One prompt sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub prompt: String,
}

/// Text returned by a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    pub text: String,
}

/// Abstraction over an upstream model API.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Provider>`).
/// Implementations must not retry or rotate keys themselves; the caller owns that
/// policy and reports every outcome back to the key pool.
pub trait Provider: Send + Sync {
    /// Identifier for logging (e.g. "gemini")
    fn id(&self) -> &str;

    /// Perform one call authenticated with `key`.
    fn call<'a>(
        &'a self,
        key: &'a str,
        request: &'a CallRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CallResponse>> + Send + 'a>>;
}
