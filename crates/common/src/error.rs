//! Configuration error types

use thiserror::Error;

/// Errors raised while loading and validating pipeline configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No API keys configured: {0}")]
    NoKeys(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("chunk_overlap must be smaller than chunk_size".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: chunk_overlap must be smaller than chunk_size"
        );

        let keys_err = Error::NoKeys("set GEMINI_API_KEYS".into());
        assert_eq!(keys_err.to_string(), "No API keys configured: set GEMINI_API_KEYS");

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(
            io_err.to_string().starts_with("I/O error:"),
            "got: {}",
            io_err
        );
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("not valid {{{{ toml");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Toml(_)), "got: {err:?}");
    }
}
