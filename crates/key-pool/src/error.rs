//! Error types for key pool operations

use chrono::{DateTime, Utc};

/// Errors from key pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key pool configuration error: {0}")]
    Configuration(String),

    #[error("all API keys exhausted: {}", describe_next(.next_available_at))]
    AllKeysExhausted {
        /// Earliest cooldown expiry among keys that are not disabled.
        /// `None` when every key is disabled.
        next_available_at: Option<DateTime<Utc>>,
    },

    #[error("unknown key index: {0}")]
    UnknownKey(usize),
}

fn describe_next(next: &Option<DateTime<Utc>>) -> String {
    match next {
        Some(at) => format!(
            "next key available at {}",
            at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "every key is disabled, operator action required".to_string(),
    }
}

/// Result alias for key pool operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn exhausted_message_names_next_available_time() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 13, 5, 0).unwrap();
        let err = Error::AllKeysExhausted {
            next_available_at: Some(at),
        };
        assert_eq!(
            err.to_string(),
            "all API keys exhausted: next key available at 2026-10-18 13:05:00 UTC"
        );
    }

    #[test]
    fn exhausted_message_without_cooldown_asks_for_operator() {
        let err = Error::AllKeysExhausted {
            next_available_at: None,
        };
        assert!(err.to_string().contains("operator action required"));
    }
}
