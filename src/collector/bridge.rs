//! Bridge between platform callbacks and the agent.
//!
//! Producers push screen and typing events through a bounded channel so they
//! never block on aggregation. Usage records are not pushed: the platform
//! exposes them through a query API, which the [`UsageLog`] emulates.

use crate::collector::types::{ScreenEvent, TelemetryEvent, TypingEvent};
use crate::collector::usage_log::UsageLog;
use crate::collector::{AppUsageEvent, CollectorError};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default capacity of the producer channel.
pub const CHANNEL_CAPACITY: usize = 10_000;

/// Owns the producer channel.
pub struct Collector {
    sender: Sender<TelemetryEvent>,
    receiver: Receiver<TelemetryEvent>,
    running: Arc<AtomicBool>,
}

impl Collector {
    /// Create a new collector with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a new collector with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start accepting events.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        Ok(())
    }

    /// Stop accepting events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get a producer handle. Clone freely across callback threads.
    pub fn sender(&self) -> EventSender {
        EventSender {
            inner: self.sender.clone(),
            running: self.running.clone(),
        }
    }

    /// Get the receiver for telemetry events.
    pub fn receiver(&self) -> &Receiver<TelemetryEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<TelemetryEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking producer handle.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<TelemetryEvent>,
    running: Arc<AtomicBool>,
}

impl EventSender {
    /// Push an event. Never blocks; a full channel rejects the event.
    ///
    /// Events pushed while the collector is stopped are discarded silently.
    pub fn send(&self, event: impl Into<TelemetryEvent>) -> Result<(), CollectorError> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.try_send(event.into()).map_err(|e| match e {
            TrySendError::Full(_) => CollectorError::ChannelFull,
            TrySendError::Disconnected(_) => CollectorError::Disconnected,
        })
    }
}

/// A normalized notification delivered by the platform shim, one JSON object
/// per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformNotification {
    /// Screen state broadcast carrying the raw action string
    Screen {
        action: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Usage-stats record carrying a raw usage code
    Usage {
        package: String,
        code: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Text change: source package and content length only
    TextChanged {
        package: String,
        length: u32,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Routes platform notifications to the producer channel or the usage log.
#[derive(Clone)]
pub struct PlatformBridge {
    sender: EventSender,
    usage_log: Arc<UsageLog>,
    transparency: SharedTransparencyLog,
}

impl PlatformBridge {
    pub fn new(
        sender: EventSender,
        usage_log: Arc<UsageLog>,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            sender,
            usage_log,
            transparency,
        }
    }

    /// Route one notification.
    ///
    /// Unknown screen actions and a full channel drop the event; neither is
    /// propagated past this call.
    pub fn dispatch(&self, notification: PlatformNotification) {
        let result = match notification {
            PlatformNotification::Screen { action, timestamp } => {
                match ScreenEvent::from_action(&action, timestamp.unwrap_or_else(Utc::now)) {
                    Ok(event) => {
                        tracing::info!(
                            at = %event.timestamp.to_rfc3339(),
                            "{}",
                            event.event_type.describe()
                        );
                        self.sender.send(event)
                    }
                    Err(e) => Err(e),
                }
            }
            PlatformNotification::Usage {
                package,
                code,
                timestamp,
            } => {
                let event =
                    AppUsageEvent::from_code(package, &code, timestamp.unwrap_or_else(Utc::now));
                self.usage_log.record(event);
                Ok(())
            }
            PlatformNotification::TextChanged {
                package,
                length,
                timestamp,
            } => {
                tracing::debug!(package = %package, length, "Text changed");
                self.sender
                    .send(TypingEvent::new(package, length, timestamp.unwrap_or_else(Utc::now)))
            }
        };

        if let Err(e) = result {
            self.transparency.record_dropped_notification();
            tracing::warn!("Dropping notification: {e}");
        }
    }

    /// Parse and route one JSON line. Blank lines are ignored.
    pub fn dispatch_line(&self, line: &str) -> Result<(), CollectorError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let notification: PlatformNotification = serde_json::from_str(line)
            .map_err(|e| CollectorError::MalformedNotification(e.to_string()))?;
        self.dispatch(notification);
        Ok(())
    }

    /// Read notifications from `reader` on a background thread until EOF or
    /// until `running` is cleared.
    pub fn spawn_reader<R>(&self, reader: R, running: Arc<AtomicBool>) -> JoinHandle<()>
    where
        R: BufRead + Send + 'static,
    {
        let bridge = self.clone();
        thread::spawn(move || {
            for line in reader.lines() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match line {
                    Ok(line) => {
                        if let Err(e) = bridge.dispatch_line(&line) {
                            bridge.transparency.record_dropped_notification();
                            tracing::warn!("Skipping input line: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::error!("Notification input closed: {e}");
                        break;
                    }
                }
            }
            tracing::info!("Notification reader finished");
        })
    }
}
