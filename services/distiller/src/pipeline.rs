//! Distillation pipeline runner
//!
//! Processes chunks strictly one at a time. For every upstream call the runner
//! takes the pool's current key, performs the call, and reports exactly one
//! outcome back to the pool before asking for a key again:
//!
//! - success with parseable pairs → `report_success`
//! - quota exceeded → `report_quota_exceeded`, retry at once on the next key
//! - transient failure (incl. unparseable output) → `report_failure`, retry up
//!   to `max_attempts`
//! - fatal failure → `report_failure`, chunk recorded as failed
//!
//! When the pool runs out of keys the run stops: results gathered so far are
//! written and the summary carries the earliest time a key becomes usable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use key_pool::{FailureClass, SharedPool, classify};
use provider::{CallRequest, Provider, ProviderError};
use tracing::{info, warn};

use crate::documents::{Document, split_into_chunks};
use crate::error::{Error, Result};
use crate::metrics;
use crate::pairs::{QaPair, build_prompt, parse_pairs};

/// Tuning knobs for a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub pairs_per_chunk: usize,
    pub max_attempts: u32,
}

/// One unit of upstream work.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub source: String,
    pub index: usize,
    pub text: String,
}

/// Result of processing one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Distilled(Vec<QaPair>),
    Failed { class: FailureClass, reason: String },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    /// Every key is cooling down or disabled.
    KeysExhausted {
        next_available_at: Option<DateTime<Utc>>,
    },
}

/// Totals for a finished or stopped run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub documents: usize,
    pub chunks_total: usize,
    pub chunks_distilled: usize,
    pub chunks_failed: usize,
    pub chunks_skipped: usize,
    pub pairs: usize,
    pub outputs: Vec<PathBuf>,
}

/// Sequential distillation over a shared key pool.
pub struct Pipeline {
    pool: SharedPool,
    provider: Arc<dyn Provider>,
    settings: Settings,
    run_id: String,
}

impl Pipeline {
    pub fn new(pool: SharedPool, provider: Arc<dyn Provider>, settings: Settings) -> Self {
        let run_id = format!("run_{}", uuid::Uuid::new_v4().as_simple());
        Self {
            pool,
            provider,
            settings,
            run_id,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Distill every document and write `{stem}_distilled.jsonl` files to `output_dir`.
    pub async fn run(&self, documents: &[Document], output_dir: &Path) -> Result<RunSummary> {
        let planned: Vec<(&Document, Vec<String>)> = documents
            .iter()
            .map(|doc| {
                let chunks = split_into_chunks(
                    &doc.text,
                    self.settings.chunk_size,
                    self.settings.chunk_overlap,
                );
                (doc, chunks)
            })
            .collect();

        let mut summary = RunSummary {
            run_id: self.run_id.clone(),
            status: RunStatus::Completed,
            documents: documents.len(),
            chunks_total: planned.iter().map(|(_, chunks)| chunks.len()).sum(),
            chunks_distilled: 0,
            chunks_failed: 0,
            chunks_skipped: 0,
            pairs: 0,
            outputs: Vec::new(),
        };
        info!(
            run_id = %self.run_id,
            provider = self.provider.id(),
            documents = summary.documents,
            chunks = summary.chunks_total,
            "distillation run started"
        );

        for (doc, chunks) in &planned {
            info!(
                run_id = %self.run_id,
                path = %doc.path.display(),
                chunks = chunks.len(),
                "distilling document"
            );
            let mut pairs = Vec::new();

            for (index, text) in chunks.iter().enumerate() {
                let chunk = Chunk {
                    source: doc.stem.clone(),
                    index,
                    text: text.clone(),
                };
                match self.process_chunk(&chunk).await {
                    Ok(ChunkOutcome::Distilled(chunk_pairs)) => {
                        summary.chunks_distilled += 1;
                        metrics::record_chunks("distilled", 1);
                        info!(
                            run_id = %self.run_id,
                            source = %chunk.source,
                            chunk = index + 1,
                            of = chunks.len(),
                            pairs = chunk_pairs.len(),
                            "chunk distilled"
                        );
                        pairs.extend(chunk_pairs);
                    }
                    Ok(ChunkOutcome::Failed { class, reason }) => {
                        summary.chunks_failed += 1;
                        metrics::record_chunks("failed", 1);
                        warn!(
                            run_id = %self.run_id,
                            source = %chunk.source,
                            chunk = index + 1,
                            class = class.label(),
                            reason = %reason,
                            "chunk failed, continuing"
                        );
                    }
                    Err(Error::Pool(key_pool::Error::AllKeysExhausted { next_available_at })) => {
                        let processed = summary.chunks_distilled + summary.chunks_failed;
                        summary.chunks_skipped = summary.chunks_total - processed;
                        metrics::record_chunks("skipped", summary.chunks_skipped as u64);
                        if !pairs.is_empty() {
                            summary.pairs += pairs.len();
                            summary
                                .outputs
                                .push(write_jsonl(output_dir, &doc.stem, &pairs).await?);
                        }
                        summary.status = RunStatus::KeysExhausted { next_available_at };
                        warn!(
                            run_id = %self.run_id,
                            skipped = summary.chunks_skipped,
                            next_available_at = ?next_available_at,
                            "all API keys exhausted, stopping run"
                        );
                        return Ok(summary);
                    }
                    Err(other) => return Err(other),
                }
            }

            summary.pairs += pairs.len();
            summary
                .outputs
                .push(write_jsonl(output_dir, &doc.stem, &pairs).await?);
        }

        info!(
            run_id = %self.run_id,
            distilled = summary.chunks_distilled,
            failed = summary.chunks_failed,
            pairs = summary.pairs,
            "distillation run completed"
        );
        Ok(summary)
    }

    /// Distill a single chunk. Fails only when the pool has no usable key.
    pub async fn process_chunk(&self, chunk: &Chunk) -> Result<ChunkOutcome> {
        let request = CallRequest {
            prompt: build_prompt(&chunk.text, self.settings.pairs_per_chunk),
        };
        let mut attempts = 0u32;

        loop {
            let selected = self.pool.current().await?;
            let started = Instant::now();
            let result = self
                .provider
                .call(selected.key.expose(), &request)
                .await
                .and_then(|response| parse_pairs(&response.text).map_err(ProviderError::Decode));
            let elapsed = started.elapsed().as_secs_f64();

            let err = match result {
                Ok(pairs) => {
                    self.pool.report_success().await;
                    metrics::record_call(self.provider.id(), "success", elapsed);
                    return Ok(ChunkOutcome::Distilled(pairs));
                }
                Err(err) => err,
            };

            let class = classify(&err.signal());
            metrics::record_call(self.provider.id(), class.label(), elapsed);
            match class {
                FailureClass::QuotaExceeded => {
                    warn!(
                        run_id = %self.run_id,
                        key_index = selected.index,
                        source = %chunk.source,
                        chunk = chunk.index + 1,
                        "quota exceeded, rotating key"
                    );
                    self.pool.report_quota_exceeded().await?;
                }
                FailureClass::Transient => {
                    attempts += 1;
                    self.pool.report_failure(&err.to_string()).await;
                    if attempts >= self.settings.max_attempts {
                        return Ok(ChunkOutcome::Failed {
                            class,
                            reason: err.to_string(),
                        });
                    }
                    warn!(
                        run_id = %self.run_id,
                        key_index = selected.index,
                        attempt = attempts,
                        max_attempts = self.settings.max_attempts,
                        error = %err,
                        "transient failure, retrying"
                    );
                }
                FailureClass::Fatal => {
                    self.pool.report_failure(&err.to_string()).await;
                    return Ok(ChunkOutcome::Failed {
                        class,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Write pairs as JSON lines to `{output_dir}/{stem}_distilled.jsonl`.
async fn write_jsonl(output_dir: &Path, stem: &str, pairs: &[QaPair]) -> Result<PathBuf> {
    let path = output_dir.join(format!("{stem}_distilled.jsonl"));
    let mut contents = String::new();
    for pair in pairs {
        contents.push_str(&serde_json::to_string(pair)?);
        contents.push('\n');
    }

    let io_err = |source| Error::Output {
        path: path.display().to_string(),
        source,
    };
    tokio::fs::create_dir_all(output_dir).await.map_err(io_err)?;
    tokio::fs::write(&path, contents).await.map_err(io_err)?;
    info!(path = %path.display(), pairs = pairs.len(), "output written");
    Ok(path)
}
