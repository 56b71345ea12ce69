//! Per-kind event buffers.
//!
//! Each event kind has its own lock so a slow snapshot of one kind never
//! blocks appends of another. No method holds more than one lock at a time.

use crate::collector::types::{AppUsageEvent, ScreenEvent, TelemetryEvent, TypingEvent};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Anything that carries an event timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for ScreenEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for AppUsageEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for TypingEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Thread-safe append/snapshot/prune store for one event kind.
#[derive(Debug)]
pub struct EventBuffer<T> {
    events: Mutex<Vec<T>>,
}

impl<T: Timestamped + Clone> EventBuffer<T> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event, preserving arrival order.
    pub fn append(&self, event: T) {
        self.lock().push(event);
    }

    /// Copy of all events with `timestamp >= since`, in arrival order.
    pub fn snapshot(&self, since: DateTime<Utc>) -> Vec<T> {
        self.lock()
            .iter()
            .filter(|e| e.timestamp() >= since)
            .cloned()
            .collect()
    }

    /// Remove every event strictly older than `cutoff`. Returns how many were removed.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let mut events = self.lock();
        let before = events.len();
        events.retain(|e| e.timestamp() >= cutoff);
        before - events.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<T: Timestamped + Clone> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three event buffers shared by producers and periodic tasks.
#[derive(Debug, Default)]
pub struct TelemetryBuffers {
    pub screen: EventBuffer<ScreenEvent>,
    pub usage: EventBuffer<AppUsageEvent>,
    pub typing: EventBuffer<TypingEvent>,
}

impl TelemetryBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route an event to the buffer for its kind.
    pub fn append(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::Screen(e) => self.screen.append(e),
            TelemetryEvent::Usage(e) => self.usage.append(e),
            TelemetryEvent::Typing(e) => self.typing.append(e),
        }
    }

    /// Prune every buffer, one lock at a time.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        self.screen.prune(cutoff) + self.usage.prune(cutoff) + self.typing.prune(cutoff)
    }

    /// Total number of buffered events.
    pub fn len(&self) -> usize {
        self.screen.len() + self.usage.len() + self.typing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all buffered events (used when collection is paused).
    pub fn clear(&self) {
        self.screen.clear();
        self.usage.clear();
        self.typing.clear();
    }
}
