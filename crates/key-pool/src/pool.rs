//! Key pool state machine and round-robin key selection
//!
//! The pool holds one `Credential` per configured API key and a pointer to the
//! key currently handed out. The pool stays on a working key until the caller
//! reports a failure; only quota exhaustion rotates.
//!
//! Cooldown transitions happen lazily: when a cooling key is checked and its
//! deadline has passed, the deadline is cleared and the key is available again.
//! Disabled keys stay disabled until an operator calls `enable` or `reset_all`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::Secret;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

/// Default number of generic failures before a key is disabled.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 3;

/// Default quota cooldown.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Derived status of a key at a point in time.
///
/// Transitions:
/// - Available → CoolingDown (quota exceeded)
/// - Available → Disabled (error threshold reached)
/// - CoolingDown → Available (deadline passed, evaluated lazily)
/// - Disabled → Available (operator `enable` / `reset_all` only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Available,
    CoolingDown { until: DateTime<Utc> },
    Disabled,
}

impl KeyStatus {
    /// Status label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            KeyStatus::Available => "available",
            KeyStatus::CoolingDown { .. } => "cooling_down",
            KeyStatus::Disabled => "disabled",
        }
    }
}

/// One API key tracked by the pool.
#[derive(Debug)]
pub struct Credential {
    key: Secret<String>,
    index: usize,
    total_calls: u64,
    error_count: u32,
    last_used_at: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
    disabled: bool,
}

impl Credential {
    fn new(index: usize, key: String) -> Self {
        Self {
            key: Secret::new(key),
            index,
            total_calls: 0,
            error_count: 0,
            last_used_at: None,
            cooldown_until: None,
            disabled: false,
        }
    }

    pub fn key(&self) -> &Secret<String> {
        &self.key
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Status at `now` without mutating anything. A passed deadline reads as available.
    pub fn status(&self, now: DateTime<Utc>) -> KeyStatus {
        if self.disabled {
            return KeyStatus::Disabled;
        }
        match self.cooldown_until {
            Some(until) if now < until => KeyStatus::CoolingDown { until },
            _ => KeyStatus::Available,
        }
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == KeyStatus::Available
    }

    fn record_call(&mut self, now: DateTime<Utc>) {
        self.total_calls += 1;
        self.last_used_at = Some(now);
    }

    fn clear(&mut self) {
        self.disabled = false;
        self.error_count = 0;
        self.cooldown_until = None;
    }
}

/// A key handed out for one upstream call.
#[derive(Debug, Clone)]
pub struct SelectedKey {
    pub index: usize,
    pub key: Secret<String>,
}

/// Pool of interchangeable API keys with quota cooldown and failure tracking.
///
/// Every method that takes `&mut self` is a complete state transition; wrap the
/// pool in `SharedPool` when more than one task needs it.
pub struct KeyPool {
    credentials: Vec<Credential>,
    current_index: usize,
    cooldown: TimeDelta,
    error_threshold: u32,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("credentials", &self.credentials)
            .field("current_index", &self.current_index)
            .field("cooldown", &self.cooldown)
            .field("error_threshold", &self.error_threshold)
            .finish_non_exhaustive()
    }
}

impl KeyPool {
    /// Create a pool on the system clock.
    pub fn new(keys: Vec<String>, cooldown: Duration, error_threshold: u32) -> Result<Self> {
        Self::with_clock(keys, cooldown, error_threshold, Arc::new(SystemClock))
    }

    /// Create a pool on an explicit clock.
    ///
    /// Fails with `Configuration` when `keys` is empty or `error_threshold` is zero.
    pub fn with_clock(
        keys: Vec<String>,
        cooldown: Duration,
        error_threshold: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::Configuration(
                "key pool requires at least one API key".into(),
            ));
        }
        if error_threshold == 0 {
            return Err(Error::Configuration(
                "error_threshold must be at least 1".into(),
            ));
        }
        let cooldown = TimeDelta::from_std(cooldown).map_err(|_| {
            Error::Configuration(format!("cooldown out of range: {}s", cooldown.as_secs()))
        })?;

        let credentials: Vec<Credential> = keys
            .into_iter()
            .enumerate()
            .map(|(index, key)| Credential::new(index, key))
            .collect();
        info!(
            keys = credentials.len(),
            cooldown_secs = cooldown.num_seconds(),
            error_threshold,
            "key pool initialized"
        );
        Ok(Self {
            credentials,
            current_index: 0,
            cooldown,
            error_threshold,
            clock,
        })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false: construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    /// Current time according to the pool's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether the key at `index` is available right now.
    pub fn is_available(&self, index: usize) -> bool {
        self.credentials
            .get(index)
            .is_some_and(|c| c.is_available(self.now()))
    }

    /// Return the key to use for the next call.
    ///
    /// Does not touch counters. If the current key is disabled or cooling down,
    /// advances to the next available key first. Fails with `AllKeysExhausted`
    /// when nothing in the pool is usable.
    pub fn current(&mut self) -> Result<SelectedKey> {
        let now = self.now();
        if self.refresh(self.current_index, now) {
            return Ok(self.selected());
        }
        match self.next_available(now) {
            Some(index) => {
                debug!(
                    from = self.current_index,
                    to = index,
                    "current key unavailable, advancing"
                );
                self.switch_to(index);
                Ok(self.selected())
            }
            None => Err(self.exhausted()),
        }
    }

    /// Record a successful call on the current key. Clears its error count; no rotation.
    pub fn report_success(&mut self) {
        let now = self.now();
        let credential = &mut self.credentials[self.current_index];
        credential.record_call(now);
        credential.error_count = 0;
        metrics::counter!("key_pool_calls_total", "outcome" => "success").increment(1);
    }

    /// Record a quota-exceeded call: cool the current key down and rotate.
    ///
    /// Returns the next available key, or `AllKeysExhausted` if none remain. On
    /// exhaustion the current pointer stays on the failed key.
    pub fn report_quota_exceeded(&mut self) -> Result<SelectedKey> {
        let now = self.now();
        let until = now
            .checked_add_signed(self.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let index = self.current_index;
        let credential = &mut self.credentials[index];
        credential.record_call(now);
        credential.error_count += 1;
        credential.cooldown_until = Some(until);
        metrics::counter!("key_pool_calls_total", "outcome" => "quota_exceeded").increment(1);
        info!(
            key_index = index,
            cooldown_secs = self.cooldown.num_seconds(),
            "key entering cooldown (quota exceeded)"
        );

        match self.next_available(now) {
            Some(next) => {
                self.switch_to(next);
                Ok(self.selected())
            }
            None => {
                let err = self.exhausted();
                warn!(key_index = index, error = %err, "no key left after quota rotation");
                Err(err)
            }
        }
    }

    /// Record a generic failure on the current key.
    ///
    /// Does not rotate. The key is disabled once its error count reaches the
    /// threshold; the next `current()` call then moves past it.
    pub fn report_failure(&mut self, reason: &str) {
        let now = self.now();
        let threshold = self.error_threshold;
        let index = self.current_index;
        let credential = &mut self.credentials[index];
        credential.record_call(now);
        credential.error_count += 1;
        metrics::counter!("key_pool_calls_total", "outcome" => "failure").increment(1);

        if !credential.disabled && credential.error_count >= threshold {
            credential.disabled = true;
            metrics::counter!("key_pool_keys_disabled_total").increment(1);
            warn!(
                key_index = index,
                errors = credential.error_count,
                reason,
                "key disabled after repeated failures"
            );
        } else {
            debug!(
                key_index = index,
                errors = credential.error_count,
                reason,
                "call failed"
            );
        }
    }

    /// Re-trust a single key: clears disabled, error count and cooldown.
    pub fn enable(&mut self, index: usize) -> Result<()> {
        let credential = self
            .credentials
            .get_mut(index)
            .ok_or(Error::UnknownKey(index))?;
        credential.clear();
        info!(key_index = index, "key re-enabled by operator");
        Ok(())
    }

    /// Re-trust every key.
    pub fn reset_all(&mut self) {
        for credential in &mut self.credentials {
            credential.clear();
        }
        info!(keys = self.credentials.len(), "all keys reset");
    }

    /// Earliest cooldown deadline among keys that are not disabled.
    pub fn earliest_available_at(&self) -> Option<DateTime<Utc>> {
        self.credentials
            .iter()
            .filter(|c| !c.disabled)
            .filter_map(|c| c.cooldown_until)
            .min()
    }

    /// Pool health summary for the status endpoint. Never includes keys.
    ///
    /// Status mapping: all available → healthy, some available → degraded,
    /// none available → unhealthy.
    pub fn health(&self) -> serde_json::Value {
        let now = self.now();
        let mut keys = Vec::with_capacity(self.credentials.len());
        let (mut available, mut cooling, mut disabled) = (0usize, 0usize, 0usize);

        for credential in &self.credentials {
            match credential.status(now) {
                KeyStatus::Available => {
                    available += 1;
                    keys.push(serde_json::json!({
                        "index": credential.index,
                        "status": "available",
                        "total_calls": credential.total_calls,
                        "error_count": credential.error_count,
                    }));
                }
                KeyStatus::CoolingDown { until } => {
                    cooling += 1;
                    keys.push(serde_json::json!({
                        "index": credential.index,
                        "status": "cooling_down",
                        "total_calls": credential.total_calls,
                        "error_count": credential.error_count,
                        "cooldown_remaining_secs": (until - now).num_seconds().max(0),
                    }));
                }
                KeyStatus::Disabled => {
                    disabled += 1;
                    keys.push(serde_json::json!({
                        "index": credential.index,
                        "status": "disabled",
                        "total_calls": credential.total_calls,
                        "error_count": credential.error_count,
                    }));
                }
            }
        }

        let total = self.credentials.len();
        let status = if available == total {
            "healthy"
        } else if available > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "current_index": self.current_index,
            "keys_total": total,
            "keys_available": available,
            "keys_cooling_down": cooling,
            "keys_disabled": disabled,
            "keys": keys,
        })
    }

    fn selected(&self) -> SelectedKey {
        let credential = &self.credentials[self.current_index];
        SelectedKey {
            index: credential.index,
            key: credential.key.clone(),
        }
    }

    fn switch_to(&mut self, index: usize) {
        if index != self.current_index {
            metrics::counter!("key_pool_rotations_total").increment(1);
            info!(from = self.current_index, to = index, "switched API key");
        }
        self.current_index = index;
    }

    /// Evaluate availability of one key, clearing an expired cooldown.
    fn refresh(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        let credential = &mut self.credentials[index];
        if credential.disabled {
            return false;
        }
        match credential.cooldown_until {
            Some(until) if now < until => false,
            Some(_) => {
                credential.cooldown_until = None;
                credential.error_count = 0;
                info!(key_index = index, "cooldown expired, key available again");
                true
            }
            None => true,
        }
    }

    /// Single round-robin pass starting just after the current key, wrapping once.
    fn next_available(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let n = self.credentials.len();
        let start = self.current_index;
        (1..=n)
            .map(|offset| (start + offset) % n)
            .find(|&index| self.refresh(index, now))
    }

    fn exhausted(&self) -> Error {
        metrics::counter!("key_pool_exhausted_total").increment(1);
        Error::AllKeysExhausted {
            next_available_at: self.earliest_available_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn pool_with(keys: &[&str], cooldown: Duration, threshold: u32) -> (KeyPool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let pool = KeyPool::with_clock(
            keys.iter().map(|k| k.to_string()).collect(),
            cooldown,
            threshold,
            clock.clone(),
        )
        .unwrap();
        (pool, clock)
    }

    fn abc() -> (KeyPool, Arc<ManualClock>) {
        pool_with(&["key-a", "key-b", "key-c"], DEFAULT_COOLDOWN, 3)
    }

    fn key_of(selected: &SelectedKey) -> &str {
        selected.key.expose()
    }

    #[test]
    fn empty_pool_is_configuration_error() {
        let err = KeyPool::new(vec![], DEFAULT_COOLDOWN, 3).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got: {err:?}");
    }

    #[test]
    fn zero_threshold_is_configuration_error() {
        let err = KeyPool::new(vec!["k".into()], DEFAULT_COOLDOWN, 0).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got: {err:?}");
    }

    #[test]
    fn new_pool_starts_in_default_state() {
        let (mut pool, _) = abc();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.current_index(), 0);
        for (i, c) in pool.credentials().iter().enumerate() {
            assert_eq!(c.index(), i);
            assert_eq!(c.total_calls(), 0);
            assert_eq!(c.error_count(), 0);
            assert!(c.last_used_at().is_none());
            assert!(c.cooldown_until().is_none());
            assert!(!c.is_disabled());
        }
        assert_eq!(key_of(&pool.current().unwrap()), "key-a");
    }

    #[test]
    fn current_does_not_touch_counters() {
        let (mut pool, _) = abc();
        for _ in 0..3 {
            pool.current().unwrap();
        }
        let a = &pool.credentials()[0];
        assert_eq!(a.total_calls(), 0);
        assert!(a.last_used_at().is_none());
    }

    #[test]
    fn success_stays_on_same_key() {
        let (mut pool, clock) = abc();
        pool.report_success();
        clock.advance(TimeDelta::seconds(5));
        pool.report_success();

        assert_eq!(pool.current_index(), 0);
        let a = &pool.credentials()[0];
        assert_eq!(a.total_calls(), 2);
        assert_eq!(a.last_used_at(), Some(start() + TimeDelta::seconds(5)));
    }

    #[test]
    fn success_resets_error_count() {
        let (mut pool, _) = abc();
        pool.report_failure("timeout");
        pool.report_failure("timeout");
        assert_eq!(pool.credentials()[0].error_count(), 2);

        pool.report_success();
        assert_eq!(pool.credentials()[0].error_count(), 0);
        assert_eq!(pool.credentials()[0].total_calls(), 3);
    }

    #[test]
    fn quota_exceeded_sets_cooldown_and_rotates() {
        let (mut pool, _) = abc();
        let next = pool.report_quota_exceeded().unwrap();
        assert_eq!(key_of(&next), "key-b");
        assert_eq!(next.index, 1);
        assert_eq!(pool.current_index(), 1);

        let a = &pool.credentials()[0];
        assert_eq!(a.total_calls(), 1);
        assert_eq!(a.error_count(), 1);
        assert_eq!(a.cooldown_until(), Some(start() + TimeDelta::hours(1)));
        assert!(!pool.is_available(0));
    }

    #[test]
    fn round_robin_visits_every_other_key_once() {
        let keys = ["k0", "k1", "k2", "k3", "k4"];
        for first in 0..keys.len() {
            let (mut pool, _) = pool_with(&keys, DEFAULT_COOLDOWN, 10);
            // Move the pointer to `first` by cooling the keys before it, then reset.
            for _ in 0..first {
                pool.report_quota_exceeded().unwrap();
            }
            pool.reset_all();
            assert_eq!(pool.current_index(), first);

            let mut visited = Vec::new();
            for _ in 0..keys.len() - 1 {
                visited.push(pool.report_quota_exceeded().unwrap().index);
            }
            let expected: Vec<usize> = (1..keys.len()).map(|o| (first + o) % keys.len()).collect();
            assert_eq!(visited, expected, "starting from {first}");
        }
    }

    #[test]
    fn cooldown_expires_exactly_at_deadline() {
        let (mut pool, clock) = pool_with(&["key-a", "key-b"], Duration::from_secs(600), 3);
        pool.report_quota_exceeded().unwrap();

        clock.advance(TimeDelta::seconds(600) - TimeDelta::milliseconds(1));
        assert!(!pool.is_available(0));

        clock.advance(TimeDelta::milliseconds(1));
        assert!(pool.is_available(0));
    }

    #[test]
    fn expired_cooldown_is_cleared_on_evaluation() {
        let (mut pool, clock) = pool_with(&["only"], Duration::from_secs(60), 3);
        let err = pool.report_quota_exceeded().unwrap_err();
        assert!(matches!(err, Error::AllKeysExhausted { .. }));

        clock.advance(TimeDelta::seconds(60));
        let selected = pool.current().unwrap();
        assert_eq!(key_of(&selected), "only");

        let c = &pool.credentials()[0];
        assert!(c.cooldown_until().is_none());
        assert_eq!(c.error_count(), 0);
    }

    #[test]
    fn current_advances_past_cooling_key() {
        let (mut pool, _) = abc();
        pool.report_quota_exceeded().unwrap();
        pool.report_quota_exceeded().unwrap();
        assert_eq!(pool.current_index(), 2);

        // Third key gets disabled; current() must skip the two cooling keys and fail.
        for _ in 0..3 {
            pool.report_failure("bad response");
        }
        let err = pool.current().unwrap_err();
        match err {
            Error::AllKeysExhausted { next_available_at } => {
                assert_eq!(next_available_at, Some(start() + TimeDelta::hours(1)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn current_moves_to_recovered_key() {
        let (mut pool, clock) = pool_with(&["key-a", "key-b"], Duration::from_secs(60), 1);
        pool.report_quota_exceeded().unwrap();
        pool.report_failure("boom");
        assert!(pool.credentials()[1].is_disabled());

        clock.advance(TimeDelta::seconds(61));
        let selected = pool.current().unwrap();
        assert_eq!(key_of(&selected), "key-a");
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn failure_below_threshold_keeps_key_enabled() {
        let (mut pool, _) = abc();
        pool.report_failure("timeout");
        pool.report_failure("timeout");
        assert!(!pool.credentials()[0].is_disabled());
        assert_eq!(pool.current_index(), 0);
        assert_eq!(key_of(&pool.current().unwrap()), "key-a");
    }

    #[test]
    fn failure_at_threshold_disables_without_rotating() {
        let (mut pool, _) = abc();
        for _ in 0..3 {
            pool.report_failure("timeout");
        }
        let a = &pool.credentials()[0];
        assert!(a.is_disabled());
        assert_eq!(a.total_calls(), 3);
        assert_eq!(pool.current_index(), 0);

        assert_eq!(key_of(&pool.current().unwrap()), "key-b");
    }

    #[test]
    fn disabled_key_does_not_recover_with_time() {
        let (mut pool, clock) = pool_with(&["only"], Duration::from_secs(60), 3);
        for _ in 0..3 {
            pool.report_failure("invalid key");
        }
        clock.advance(TimeDelta::days(30));
        let err = pool.current().unwrap_err();
        assert!(matches!(
            err,
            Error::AllKeysExhausted {
                next_available_at: None
            }
        ));
    }

    #[test]
    fn exhaustion_reported_by_current_and_quota() {
        let (mut pool, _) = pool_with(&["key-a", "key-b"], DEFAULT_COOLDOWN, 3);
        pool.report_quota_exceeded().unwrap();
        let err = pool.report_quota_exceeded().unwrap_err();
        assert!(matches!(err, Error::AllKeysExhausted { .. }));
        // Pointer stays on the key that just failed.
        assert_eq!(pool.current_index(), 1);

        let err = pool.current().unwrap_err();
        assert!(matches!(err, Error::AllKeysExhausted { .. }));
    }

    #[test]
    fn earliest_available_ignores_disabled_keys() {
        let (mut pool, clock) = pool_with(&["key-a", "key-b"], Duration::from_secs(600), 3);
        pool.report_quota_exceeded().unwrap(); // a cools until +600s
        clock.advance(TimeDelta::seconds(60));
        pool.report_quota_exceeded().unwrap_err(); // b cools until +660s, pointer stays on b
        for _ in 0..3 {
            pool.report_failure("x");
        }
        assert!(pool.credentials()[1].is_disabled());
        assert_eq!(
            pool.earliest_available_at(),
            Some(start() + TimeDelta::seconds(600))
        );

        clock.set(start() + TimeDelta::seconds(600));
        assert_eq!(key_of(&pool.current().unwrap()), "key-a");
        pool.report_quota_exceeded().unwrap_err(); // a cools until +1200s

        // b's deadline (+660s) is earlier but b is disabled.
        assert_eq!(
            pool.earliest_available_at(),
            Some(start() + TimeDelta::seconds(1200))
        );
    }

    #[test]
    fn three_key_scenario() {
        let (mut pool, _) = abc();

        assert_eq!(key_of(&pool.current().unwrap()), "key-a");

        let b = pool.report_quota_exceeded().unwrap();
        assert_eq!(key_of(&b), "key-b");
        assert_eq!(
            pool.credentials()[0].cooldown_until(),
            Some(start() + TimeDelta::minutes(60))
        );

        pool.report_success();
        assert_eq!(pool.credentials()[1].error_count(), 0);
        assert_eq!(pool.credentials()[1].total_calls(), 1);

        let c = pool.report_quota_exceeded().unwrap();
        assert_eq!(key_of(&c), "key-c");

        let err = pool.report_quota_exceeded().unwrap_err();
        assert!(matches!(
            err,
            Error::AllKeysExhausted {
                next_available_at: Some(_)
            }
        ));
    }

    #[test]
    fn single_key_disabled_by_failures() {
        let (mut pool, _) = pool_with(&["only"], DEFAULT_COOLDOWN, 3);
        for _ in 0..3 {
            pool.report_failure("server error");
        }
        assert!(pool.credentials()[0].is_disabled());
        assert!(pool.credentials()[0].cooldown_until().is_none());
        assert!(matches!(
            pool.current().unwrap_err(),
            Error::AllKeysExhausted { .. }
        ));
    }

    #[test]
    fn availability_invariant_holds_across_transitions() {
        let (mut pool, clock) = pool_with(&["a1", "b2", "c3"], Duration::from_secs(120), 2);
        let ops: [fn(&mut KeyPool); 4] = [
            |p| p.report_success(),
            |p| {
                let _ = p.report_quota_exceeded();
            },
            |p| p.report_failure("x"),
            |p| {
                let _ = p.current();
            },
        ];
        for step in 0..40usize {
            ops[step * 7 % ops.len()](&mut pool);
            clock.advance(TimeDelta::seconds(17));
            let now = pool.now();
            for (i, c) in pool.credentials().iter().enumerate() {
                let expected = !c.is_disabled() && c.cooldown_until().is_none_or(|u| now >= u);
                assert_eq!(pool.is_available(i), expected, "step {step}, key {i}");
            }
        }
    }

    #[test]
    fn enable_and_reset_restore_keys() {
        let (mut pool, _) = pool_with(&["key-a", "key-b"], DEFAULT_COOLDOWN, 1);
        pool.report_failure("bad");
        assert_eq!(key_of(&pool.current().unwrap()), "key-b");
        pool.report_quota_exceeded().unwrap_err();

        pool.enable(0).unwrap();
        assert!(pool.is_available(0));
        assert!(!pool.is_available(1));

        assert!(matches!(pool.enable(9), Err(Error::UnknownKey(9))));

        pool.reset_all();
        assert!(pool.is_available(1));
        assert_eq!(pool.credentials()[1].error_count(), 0);
    }

    #[test]
    fn health_reports_counts_without_keys() {
        let (mut pool, _) = pool_with(&["secret-key-a", "secret-key-b"], DEFAULT_COOLDOWN, 3);
        let health = pool.health();
        assert_eq!(health["status"], "healthy");

        pool.report_quota_exceeded().unwrap();
        let health = pool.health();
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["keys_cooling_down"], 1);
        assert_eq!(health["current_index"], 1);
        assert_eq!(health["keys"][0]["cooldown_remaining_secs"], 3600);

        for _ in 0..3 {
            pool.report_failure("x");
        }
        let health = pool.health();
        assert_eq!(health["status"], "unhealthy");
        assert_eq!(health["keys_disabled"], 1);
        assert!(!health.to_string().contains("secret-key"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let (pool, _) = pool_with(&["AIzaSyVerySecret"], DEFAULT_COOLDOWN, 3);
        let debug = format!("{pool:?}");
        assert!(!debug.contains("AIzaSyVerySecret"), "got: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }
}
