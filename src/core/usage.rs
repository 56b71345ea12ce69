//! Per-app foreground duration tracking.
//!
//! Durations are approximated: a RESUMED event adds the time elapsed since the
//! previous usage poll to the app's running total, rather than pairing exact
//! resume/pause timestamps. A PAUSED event finalizes the running total into a
//! [`UsageSession`].

use crate::collector::types::{AppUsageEvent, AppUsageEventType};
use crate::collector::usage_log::{label_or_package, AppLabelResolver};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stretch of foreground usage attributed to one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSession {
    /// Human-readable app name (package name if lookup failed)
    pub app_label: String,
    pub package_name: String,
    /// Accumulated foreground time in milliseconds
    pub duration_ms: i64,
    /// When the session ended, or the flush instant for still-running apps
    pub ended_at: DateTime<Utc>,
    /// Whether the app was still in the foreground when this was emitted
    pub still_running: bool,
}

impl UsageSession {
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

/// Stateful reducer over the app usage event stream.
#[derive(Debug)]
pub struct UsageDurationTracker {
    running: HashMap<String, i64>,
    last_check: DateTime<Utc>,
}

impl UsageDurationTracker {
    /// Create a tracker whose first RESUMED deltas are measured from `started_at`.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            running: HashMap::new(),
            last_check: started_at,
        }
    }

    /// Fold one usage event. Returns a finalized session on PAUSED for an app
    /// with a running total.
    pub fn fold(
        &mut self,
        event: &AppUsageEvent,
        resolver: &dyn AppLabelResolver,
    ) -> Option<UsageSession> {
        match event.event_type {
            AppUsageEventType::Resumed => {
                // Records older than the last check would yield negative time.
                let delta = (event.timestamp - self.last_check).num_milliseconds().max(0);
                *self.running.entry(event.package_name.clone()).or_insert(0) += delta;
                None
            }
            AppUsageEventType::Paused => {
                let duration_ms = self.running.remove(&event.package_name)?;
                Some(UsageSession {
                    app_label: label_or_package(resolver, &event.package_name),
                    package_name: event.package_name.clone(),
                    duration_ms,
                    ended_at: event.timestamp,
                    still_running: false,
                })
            }
            _ => None,
        }
    }

    /// Report every still-running app as of `now`, without removing it.
    pub fn flush_running(
        &self,
        now: DateTime<Utc>,
        resolver: &dyn AppLabelResolver,
    ) -> Vec<UsageSession> {
        let mut sessions: Vec<UsageSession> = self
            .running
            .iter()
            .map(|(package, duration_ms)| UsageSession {
                app_label: label_or_package(resolver, package),
                package_name: package.clone(),
                duration_ms: *duration_ms,
                ended_at: now,
                still_running: true,
            })
            .collect();
        sessions.sort_by(|a, b| a.package_name.cmp(&b.package_name));
        sessions
    }

    /// Record the poll instant used as the base for subsequent RESUMED deltas.
    pub fn mark_checked(&mut self, now: DateTime<Utc>) {
        self.last_check = now;
    }

    pub fn last_check(&self) -> DateTime<Utc> {
        self.last_check
    }

    /// Current running total for a package, if any.
    pub fn running_ms(&self, package_name: &str) -> Option<i64> {
        self.running.get(package_name).copied()
    }
}
