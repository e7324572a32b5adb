//! Shared handle for using one pool from several tasks
//!
//! Every operation takes the single pool mutex for its whole duration, so each
//! report and each selection is one critical section. No lock is held across
//! an upstream call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::pool::{KeyPool, SelectedKey};
use crate::report::render_report;

/// Cloneable, explicitly passed handle to a `KeyPool`.
#[derive(Clone)]
pub struct SharedPool {
    inner: Arc<Mutex<KeyPool>>,
}

impl SharedPool {
    pub fn new(pool: KeyPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    /// Lock the pool for a compound read.
    pub async fn lock(&self) -> MutexGuard<'_, KeyPool> {
        self.inner.lock().await
    }

    pub async fn current(&self) -> Result<SelectedKey> {
        self.inner.lock().await.current()
    }

    pub async fn report_success(&self) {
        self.inner.lock().await.report_success();
    }

    pub async fn report_quota_exceeded(&self) -> Result<SelectedKey> {
        self.inner.lock().await.report_quota_exceeded()
    }

    pub async fn report_failure(&self, reason: &str) {
        self.inner.lock().await.report_failure(reason);
    }

    pub async fn enable(&self, index: usize) -> Result<()> {
        self.inner.lock().await.enable(index)
    }

    pub async fn reset_all(&self) {
        self.inner.lock().await.reset_all();
    }

    pub async fn earliest_available_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.earliest_available_at()
    }

    /// Status report text.
    pub async fn report(&self) -> String {
        render_report(&*self.inner.lock().await)
    }

    pub async fn health(&self) -> serde_json::Value {
        self.inner.lock().await.health()
    }
}
