//! Human-readable key pool status report
//!
//! This is the only place a key is rendered, and only in masked form (first 6
//! and last 4 characters). Key numbers in the report are 1-based positions.

use chrono::{DateTime, Utc};

use crate::pool::{KeyPool, KeyStatus};

const HEADER: &str = "=== API key status ===";

/// Mask a key for display. Keys of 10 characters or fewer are fully hidden.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 10 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Render a snapshot of every key, in index order. Read-only.
pub fn render_report(pool: &KeyPool) -> String {
    let now = pool.now();
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    for credential in pool.credentials() {
        out.push_str(&format!(
            "\nKey #{}: {}\n",
            credential.index() + 1,
            mask_key(credential.key().expose())
        ));
        out.push_str(&format!("  status: {}\n", describe_status(credential.status(now), now)));
        out.push_str(&format!("  calls: {}\n", credential.total_calls()));
        out.push_str(&format!("  errors: {}\n", credential.error_count()));
        out.push_str(&format!(
            "  last used: {}\n",
            credential
                .last_used_at()
                .map(format_time)
                .unwrap_or_else(|| "never".to_string())
        ));
    }

    out.push_str(&format!("\nCurrent key: #{}\n", pool.current_index() + 1));
    out.push_str(&"=".repeat(HEADER.len()));
    out.push('\n');
    out
}

fn describe_status(status: KeyStatus, now: DateTime<Utc>) -> String {
    match status {
        KeyStatus::Available => "available".to_string(),
        KeyStatus::Disabled => "disabled".to_string(),
        KeyStatus::CoolingDown { until } => {
            let secs = (until - now).num_seconds().max(0);
            let minutes = (secs + 59) / 60;
            format!("cooling down ({minutes} min remaining)")
        }
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
