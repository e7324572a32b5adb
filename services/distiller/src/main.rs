//! Gemini QA distiller
//!
//! Single binary that:
//! 1. Loads configuration and resolves the Gemini API keys from the environment
//! 2. Splits every text document in the input directory into chunks
//! 3. Asks Gemini for QA pairs per chunk, rotating keys on quota errors
//! 4. Writes `{stem}_distilled.jsonl` files and logs a key status report
//!
//! Exits with status 2 when every key is exhausted before the run completes.

mod config;
mod documents;
mod error;
mod gemini;
mod metrics;
mod pairs;
mod pipeline;
mod status;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use key_pool::{KeyPool, SharedPool};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::gemini::GeminiProvider;
use crate::pipeline::{Pipeline, RunStatus, Settings};
use crate::status::StatusState;

/// Exit code when the run stopped because no key was usable.
const EXIT_KEYS_EXHAUSTED: i32 = 2;

/// How long the status listener may take to drain after the run ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, LOG_LEVEL first, then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting distiller");

    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: --config <path> and --input <dir>
    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    };

    let config_path = Config::resolve_path(flag("--config"));
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(input) = flag("--input") {
        config.pipeline.input_dir = input.into();
    }

    info!(
        keys = config.keys.len(),
        model = %config.gemini.model,
        input_dir = %config.pipeline.input_dir.display(),
        output_dir = %config.pipeline.output_dir.display(),
        cooldown_minutes = config.pool.cooldown_minutes,
        error_threshold = config.pool.error_threshold,
        "configuration loaded"
    );

    let keys = config
        .keys
        .iter()
        .map(|k| k.expose().to_string())
        .collect();
    let pool = SharedPool::new(
        KeyPool::new(keys, config.pool.cooldown(), config.pool.error_threshold)
            .context("failed to build key pool")?,
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.gemini.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let provider = Arc::new(GeminiProvider::new(client, &config.gemini));

    // Optional status listener, stopped once the run is over
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let status_server = match config.status.listen_addr {
        Some(addr) => {
            let app = status::build_router(
                StatusState {
                    pool: pool.clone(),
                    prometheus: prometheus_handle,
                },
                config.status.max_connections,
            );
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind status listener to {addr}"))?;
            info!(addr = %addr, "status listener running");
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
            }))
        }
        None => None,
    };

    let documents = documents::load_documents(&config.pipeline.input_dir).with_context(|| {
        format!(
            "failed to read documents from {}",
            config.pipeline.input_dir.display()
        )
    })?;
    if documents.is_empty() {
        warn!(
            input_dir = %config.pipeline.input_dir.display(),
            "no .txt or .md documents found"
        );
    }

    let pipeline = Pipeline::new(
        pool.clone(),
        provider,
        Settings {
            chunk_size: config.pipeline.chunk_size,
            chunk_overlap: config.pipeline.chunk_overlap,
            pairs_per_chunk: config.pipeline.pairs_per_chunk,
            max_attempts: config.pipeline.max_attempts,
        },
    );
    info!(run_id = pipeline.run_id(), "pipeline ready");

    let outcome = tokio::select! {
        result = pipeline.run(&documents, &config.pipeline.output_dir) => Some(result),
        _ = shutdown_signal() => None,
    };

    let _ = shutdown_tx.send(());
    if let Some(server) = status_server {
        match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
            Ok(Ok(Ok(()))) => info!("status listener stopped"),
            Ok(Ok(Err(e))) => error!(error = %e, "status listener error during shutdown"),
            Ok(Err(e)) => error!(error = %e, "status listener task panicked"),
            Err(_) => warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "status listener drain timed out"
            ),
        }
    }

    info!(report = %pool.report().await, "final key status");

    let Some(result) = outcome else {
        warn!(run_id = pipeline.run_id(), "run interrupted, partial outputs were not written");
        return Ok(());
    };
    let summary = result.context("distillation run failed")?;

    info!(
        run_id = %summary.run_id,
        documents = summary.documents,
        chunks = summary.chunks_total,
        distilled = summary.chunks_distilled,
        failed = summary.chunks_failed,
        skipped = summary.chunks_skipped,
        pairs = summary.pairs,
        outputs = summary.outputs.len(),
        "run summary"
    );

    match summary.status {
        RunStatus::Completed => {
            info!("shutdown complete");
            Ok(())
        }
        RunStatus::KeysExhausted { next_available_at } => {
            let err = key_pool::Error::AllKeysExhausted { next_available_at };
            error!(
                run_id = %summary.run_id,
                next_available_at = ?next_available_at,
                "{err}"
            );
            std::process::exit(EXIT_KEYS_EXHAUSTED);
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
