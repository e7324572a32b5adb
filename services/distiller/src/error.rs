//! Pipeline error types

use thiserror::Error;

/// Errors that abort a distillation run.
///
/// Per-chunk upstream failures never surface here: the pipeline classifies
/// them, reports them to the key pool and records the chunk as failed. Key
/// exhaustion is a normal stop and is carried in the run summary instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("key pool error: {0}")]
    Pool(#[from] key_pool::Error),

    #[error("failed to write output {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize QA pair: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result alias using pipeline Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = Error::Output {
            path: "data/manual_distilled.jsonl".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "failed to write output data/manual_distilled.jsonl: denied"
        );

        let err = Error::Pool(key_pool::Error::UnknownKey(4));
        assert_eq!(err.to_string(), "key pool error: unknown key index: 4");
    }

    #[test]
    fn error_debug_includes_variant_name() {
        let err = Error::Pool(key_pool::Error::Configuration("empty".into()));
        let debug = format!("{err:?}");
        assert!(
            debug.contains("Pool"),
            "Debug output must include variant name, got: {debug}"
        );
    }
}
