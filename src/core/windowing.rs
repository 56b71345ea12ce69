//! Window aggregation.
//!
//! Every window tick snapshots the event buffers for `[now - window, now)`,
//! reduces them to a [`WindowMetrics`] summary and prunes everything older
//! than the window start.

use crate::collector::types::{
    AppUsageEvent, AppUsageEventType, ScreenEvent, ScreenEventType, TypingEvent,
};
use crate::core::buffer::TelemetryBuffers;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Events captured for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWindow {
    /// Start time of the window
    pub start: DateTime<Utc>,
    /// End time of the window (exclusive)
    pub end: DateTime<Utc>,
    pub screen_events: Vec<ScreenEvent>,
    pub usage_events: Vec<AppUsageEvent>,
    pub typing_events: Vec<TypingEvent>,
}

impl EventWindow {
    /// Create a new empty window starting at the given time.
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
            screen_events: Vec::new(),
            usage_events: Vec::new(),
            typing_events: Vec::new(),
        }
    }

    /// Check if a timestamp falls within this window.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Check if the window has any events.
    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    /// Get the total number of events in this window.
    pub fn event_count(&self) -> usize {
        self.screen_events.len() + self.usage_events.len() + self.typing_events.len()
    }

    /// Get the duration of this window in seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Aggregate metrics for one window. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub duration_seconds: i64,
    /// Screen-on time in milliseconds, including a still-open ON interval
    pub screen_on_duration_ms: i64,
    /// Number of unlocks (USER_PRESENT events)
    pub unlock_count: u32,
    /// Sum of typed text lengths
    pub keys_typed: u64,
    /// Distinct packages moved to the foreground
    pub active_apps: BTreeSet<String>,
}

impl WindowMetrics {
    /// Number of distinct foreground apps.
    pub fn active_app_count(&self) -> usize {
        self.active_apps.len()
    }
}

/// Screen-on time for `events`, measured in milliseconds.
///
/// ON/OFF pairs are matched in timestamp order. A repeated ON restarts the
/// open interval, an OFF with no open interval is ignored, and USER_PRESENT
/// never affects the total. An interval still open at the end counts up to
/// `now`.
pub fn compute_screen_on_duration(events: &[ScreenEvent], now: DateTime<Utc>) -> i64 {
    let mut sorted: Vec<&ScreenEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let mut duration = 0i64;
    let mut last_on: Option<DateTime<Utc>> = None;

    for event in sorted {
        match event.event_type {
            ScreenEventType::ScreenOn => last_on = Some(event.timestamp),
            ScreenEventType::ScreenOff => {
                if let Some(on) = last_on.take() {
                    duration += (event.timestamp - on).num_milliseconds();
                }
            }
            ScreenEventType::UserPresent => {}
        }
    }

    if let Some(on) = last_on {
        duration += (now - on).num_milliseconds().max(0);
    }

    duration.max(0)
}

/// Reduce a window of events to metrics, using `now` for open ON intervals.
pub fn compute_metrics(window: &EventWindow, now: DateTime<Utc>) -> WindowMetrics {
    let screen: Vec<ScreenEvent> = window
        .screen_events
        .iter()
        .filter(|e| window.contains(e.timestamp))
        .cloned()
        .collect();

    let unlock_count = screen
        .iter()
        .filter(|e| e.event_type == ScreenEventType::UserPresent)
        .count() as u32;

    let keys_typed = window
        .typing_events
        .iter()
        .filter(|e| window.contains(e.timestamp))
        .map(|e| u64::from(e.text_length))
        .sum();

    let active_apps = window
        .usage_events
        .iter()
        .filter(|e| e.event_type == AppUsageEventType::Foreground && window.contains(e.timestamp))
        .map(|e| e.package_name.clone())
        .collect();

    WindowMetrics {
        window_start: window.start,
        window_end: window.end,
        duration_seconds: window.duration_secs(),
        screen_on_duration_ms: compute_screen_on_duration(&screen, now),
        unlock_count,
        keys_typed,
        active_apps,
    }
}

/// Snapshots the buffers for the closing window and prunes them afterwards.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    window_duration: Duration,
}

impl WindowAggregator {
    /// Create a new aggregator with the given window duration.
    pub fn new(window_duration: std::time::Duration) -> Self {
        Self {
            window_duration: Duration::milliseconds(window_duration.as_millis() as i64),
        }
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    /// Copy the events belonging to the window ending at `now`.
    ///
    /// Each buffer is snapshotted under its own lock, one at a time.
    pub fn collect(&self, buffers: &TelemetryBuffers, now: DateTime<Utc>) -> EventWindow {
        let start = now - self.window_duration;
        let mut window = EventWindow::new(start, self.window_duration);
        window.screen_events = buffers.screen.snapshot(start);
        window.usage_events = buffers.usage.snapshot(start);
        window.typing_events = buffers.typing.snapshot(start);
        window
    }

    /// Compute metrics for the window ending at `now`, then prune the buffers
    /// of everything before the window start.
    pub fn aggregate(&self, buffers: &TelemetryBuffers, now: DateTime<Utc>) -> WindowMetrics {
        let window = self.collect(buffers, now);
        let metrics = compute_metrics(&window, now);
        let pruned = buffers.prune(window.start);
        tracing::trace!(pruned, events = window.event_count(), "Window collected");
        metrics
    }
}
