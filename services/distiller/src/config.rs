//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys are never read from the TOML. They come from the environment
//! (GEMINI_API_KEY_1..N, GEMINI_API_KEYS, GEMINI_API_KEY) or from a key file
//! listed in the config, one key per line.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub status: StatusConfig,
    /// Resolved API keys, in pool order
    #[serde(skip)]
    pub keys: Vec<Secret<String>>,
}

/// Key pool settings
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
}

/// Upstream model API settings
#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// File with one API key per line, used when no key env var is set
    #[serde(default)]
    pub keys_file: Option<PathBuf>,
}

/// Document processing settings
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_pairs_per_chunk")]
    pub pairs_per_chunk: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Optional status listener
#[derive(Debug, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_cooldown_minutes() -> u64 {
    60
}

fn default_error_threshold() -> u32 {
    3
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_chunk_size() -> usize {
    15_000
}

fn default_chunk_overlap() -> usize {
    500
}

fn default_pairs_per_chunk() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_connections() -> usize {
    64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            error_threshold: default_error_threshold(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            keys_file: None,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            max_connections: default_max_connections(),
        }
    }
}

impl PoolConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }

    /// Cooldown in seconds, if it fits both `u64` and a `chrono::TimeDelta`.
    fn checked_cooldown_secs(&self) -> Option<u64> {
        let secs = self.cooldown_minutes.checked_mul(60)?;
        chrono::TimeDelta::from_std(Duration::from_secs(secs))
            .ok()
            .map(|_| secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, validate it, then resolve API keys
    /// from the process environment.
    pub fn load(path: &Path) -> common::Result<Self> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Same as `load`, with an explicit environment lookup.
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        let mut keys = keys_from_env(&env);
        if keys.is_empty() {
            if let Some(ref keys_file) = config.gemini.keys_file {
                let contents = std::fs::read_to_string(keys_file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read keys_file {}: {e}",
                        keys_file.display()
                    ))
                })?;
                keys = split_keys(contents.lines());
            }
        }
        if keys.is_empty() {
            return Err(common::Error::NoKeys(
                "set GEMINI_API_KEY_1.., GEMINI_API_KEYS, GEMINI_API_KEY or gemini.keys_file"
                    .into(),
            ));
        }
        config.keys = keys.into_iter().map(Secret::new).collect();

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.pool.cooldown_minutes == 0 {
            return Err(common::Error::Config(
                "cooldown_minutes must be greater than 0".into(),
            ));
        }
        if self.pool.checked_cooldown_secs().is_none() {
            return Err(common::Error::Config(format!(
                "cooldown_minutes is too large: {}",
                self.pool.cooldown_minutes
            )));
        }
        if self.pool.error_threshold == 0 {
            return Err(common::Error::Config(
                "error_threshold must be at least 1".into(),
            ));
        }
        if !self.gemini.base_url.starts_with("http://")
            && !self.gemini.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.gemini.base_url
            )));
        }
        if self.gemini.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.pipeline.chunk_size == 0 {
            return Err(common::Error::Config(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if self.pipeline.chunk_overlap >= self.pipeline.chunk_size {
            return Err(common::Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.pipeline.chunk_overlap, self.pipeline.chunk_size
            )));
        }
        if self.pipeline.pairs_per_chunk == 0 {
            return Err(common::Error::Config(
                "pairs_per_chunk must be greater than 0".into(),
            ));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(common::Error::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.status.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("distiller.toml")
    }
}

/// Keys from the environment, first match wins:
/// 1. GEMINI_API_KEY_1, GEMINI_API_KEY_2, ... (stops at the first gap)
/// 2. GEMINI_API_KEYS, comma separated
/// 3. GEMINI_API_KEY
fn keys_from_env(env: &impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut numbered = Vec::new();
    for i in 1.. {
        match env(&format!("GEMINI_API_KEY_{i}")) {
            Some(key) if !key.trim().is_empty() => numbered.push(key.trim().to_string()),
            _ => break,
        }
    }
    if !numbered.is_empty() {
        return numbered;
    }

    if let Some(list) = env("GEMINI_API_KEYS") {
        let keys = split_keys(list.split(','));
        if !keys.is_empty() {
            return keys;
        }
    }

    env("GEMINI_API_KEY")
        .map(|key| split_keys(std::iter::once(key.as_str())))
        .unwrap_or_default()
}

fn split_keys<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    raw.map(str::trim)
        .filter(|k| !k.is_empty() && !k.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
