//! Failure classification for upstream model API errors
//!
//! Maps the opaque `Signal` a provider reports into a `FailureClass`. Quota
//! markers are only looked for in what the upstream said (status, body, vendor
//! message). Local transport and decode failures are never quota events, and
//! anything unrecognized is fatal.

use provider::{FailureClass, Signal};

/// Quota exhaustion markers in error bodies and messages (matched lowercase).
const QUOTA_PATTERNS: &[&str] = &[
    "resource_exhausted",
    "quota",
    "rate limit",
    "rate-limit",
    "too many requests",
    "resource has been exhausted",
];

/// Words that make a following `429` an HTTP status rather than any number.
const STATUS_PREFIXES: &[&str] = &["status", "code", "http", "error"];

/// Markers of retryable failures in free-form messages (matched lowercase).
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "reset by peer",
    "unavailable",
    "deadline",
    "malformed",
    "invalid json",
    "decode",
    "truncated",
];

/// HTTP statuses with a known, retryable meaning.
const RECOGNIZED_STATUSES: &[u16] = &[400, 401, 403, 404, 408, 409, 500, 502, 503, 504];

/// Classify any failure signal.
pub fn classify(signal: &Signal) -> FailureClass {
    match signal {
        Signal::Status { code, body } => classify_status(*code, body),
        Signal::Transport(message) => classify_transport(message),
        Signal::Malformed(_) => FailureClass::Transient,
        Signal::Message(message) => classify_message(message),
    }
}

/// Classify an upstream error by HTTP status and response body.
///
/// 429 is always quota exhaustion. 403 is quota exhaustion when its body
/// carries a quota marker (some vendors report exhausted projects that way),
/// otherwise an ordinary recognized failure.
pub fn classify_status(status: u16, body: &str) -> FailureClass {
    match status {
        429 => FailureClass::QuotaExceeded,
        403 if mentions_quota(body) => FailureClass::QuotaExceeded,
        s if RECOGNIZED_STATUSES.contains(&s) => FailureClass::Transient,
        _ => FailureClass::Fatal,
    }
}

/// Classify a vendor or SDK failure known only by its message.
pub fn classify_message(message: &str) -> FailureClass {
    if mentions_quota(message) {
        return FailureClass::QuotaExceeded;
    }
    classify_transport(message)
}

/// Classify a failure that never got an HTTP response. Never quota.
pub fn classify_transport(message: &str) -> FailureClass {
    let lower = message.to_lowercase();
    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

fn mentions_quota(text: &str) -> bool {
    let lower = text.to_lowercase();
    QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) || mentions_status_429(&lower)
}

/// `429` as a standalone token that leads the text or follows a status word.
fn mentions_status_429(lower: &str) -> bool {
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.iter().enumerate().any(|(i, token)| {
        *token == "429" && (i == 0 || STATUS_PREFIXES.contains(&tokens[i - 1]))
    })
}
