//! Queryable store of app usage records.
//!
//! The platform delivers app usage as the result of a range query rather than
//! as pushed callbacks. [`UsageStatsSource`] is that query seam; [`UsageLog`]
//! is the in-memory implementation fed by the platform bridge.

use crate::collector::types::AppUsageEvent;
use crate::collector::CollectorError;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

/// How long raw usage records are retained for querying.
const RETENTION_MINUTES: i64 = 60;

/// Upper bound on retained usage records.
const MAX_RECORDS: usize = 50_000;

/// Source of app usage records, queried by time range.
pub trait UsageStatsSource: Send + Sync {
    /// Return records with `start <= timestamp < end`, in ascending time order.
    fn query_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppUsageEvent>, CollectorError>;
}

/// Resolves package names to human-readable app labels.
pub trait AppLabelResolver: Send + Sync {
    fn resolve_label(&self, package_name: &str) -> Result<String, CollectorError>;
}

/// Resolve a label, falling back to the package name on failure.
pub fn label_or_package(resolver: &dyn AppLabelResolver, package_name: &str) -> String {
    match resolver.resolve_label(package_name) {
        Ok(label) => label,
        Err(e) => {
            tracing::debug!("{e}; using package name");
            package_name.to_string()
        }
    }
}

/// In-memory usage record store with a permission gate and label map.
#[derive(Debug)]
pub struct UsageLog {
    records: Mutex<VecDeque<AppUsageEvent>>,
    permission_granted: AtomicBool,
    labels: RwLock<HashMap<String, String>>,
}

impl UsageLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            permission_granted: AtomicBool::new(true),
            labels: RwLock::new(HashMap::new()),
        }
    }

    /// Create a usage log pre-populated with app labels.
    pub fn with_labels(labels: HashMap<String, String>) -> Self {
        let log = Self::new();
        *log.labels.write().unwrap_or_else(PoisonError::into_inner) = labels;
        log
    }

    /// Store a usage record, discarding anything past the retention horizon.
    pub fn record(&self, event: AppUsageEvent) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let horizon = event.timestamp - Duration::minutes(RETENTION_MINUTES);

        // Keep records sorted; platform batches arrive mostly in order.
        let pos = records
            .iter()
            .rposition(|r| r.timestamp <= event.timestamp)
            .map_or(0, |i| i + 1);
        records.insert(pos, event);

        while records
            .front()
            .is_some_and(|r| r.timestamp < horizon)
            || records.len() > MAX_RECORDS
        {
            records.pop_front();
        }
    }

    /// Grant or revoke usage-stats access.
    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// Register a human-readable label for a package.
    pub fn set_label(&self, package_name: impl Into<String>, label: impl Into<String>) {
        self.labels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package_name.into(), label.into());
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UsageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageStatsSource for UsageLog {
    fn query_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppUsageEvent>, CollectorError> {
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(CollectorError::PermissionDenied);
        }
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .cloned()
            .collect())
    }
}

impl AppLabelResolver for UsageLog {
    fn resolve_label(&self, package_name: &str) -> Result<String, CollectorError> {
        self.labels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(package_name)
            .cloned()
            .ok_or_else(|| CollectorError::AppLookupFailed(package_name.to_string()))
    }
}
