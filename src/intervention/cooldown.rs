//! Per-key cooldown bookkeeping.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Last firing instant per intervention key, with a shared minimum interval.
///
/// Every check-and-update happens under one lock, so two callers racing on
/// the same key cannot both fire. Recorded instants never move backwards.
#[derive(Debug)]
pub struct CooldownTable {
    minimum_interval: Duration,
    last_fired: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTable {
    pub fn new(minimum_interval: std::time::Duration) -> Self {
        Self {
            minimum_interval: Duration::milliseconds(minimum_interval.as_millis() as i64),
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.last_fired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn minimum_interval(&self) -> Duration {
        self.minimum_interval
    }

    pub fn last_fired(&self, key: &str) -> Option<DateTime<Utc>> {
        self.lock().get(key).copied()
    }

    fn ready_in(&self, map: &HashMap<String, DateTime<Utc>>, key: &str, now: DateTime<Utc>) -> bool {
        match map.get(key) {
            Some(last) => now - *last >= self.minimum_interval,
            None => true,
        }
    }

    fn record_in(map: &mut HashMap<String, DateTime<Utc>>, key: &str, now: DateTime<Utc>) {
        let entry = map.entry(key.to_string()).or_insert(now);
        if now > *entry {
            *entry = now;
        }
    }

    /// Whether `key` may fire at `now`.
    pub fn is_ready(&self, key: &str, now: DateTime<Utc>) -> bool {
        let map = self.lock();
        self.ready_in(&map, key, now)
    }

    /// Fire `key` at `now` if its cooldown has elapsed. Returns whether it fired.
    pub fn try_acquire(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut map = self.lock();
        if !self.ready_in(&map, key, now) {
            return false;
        }
        Self::record_in(&mut map, key, now);
        true
    }

    /// Run `action` if `key` is ready, recording the firing only when the
    /// action succeeds.
    ///
    /// Returns `Ok(false)` when still cooling down. The lock is held while
    /// `action` runs.
    pub fn fire_if_ready<E>(
        &self,
        key: &str,
        now: DateTime<Utc>,
        action: impl FnOnce() -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut map = self.lock();
        if !self.ready_in(&map, key, now) {
            return Ok(false);
        }
        action()?;
        Self::record_in(&mut map, key, now);
        Ok(true)
    }
}
