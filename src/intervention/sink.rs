//! Outbound command channel to the platform shim.
//!
//! Presentation and lifecycle requests are written as JSON lines. The shim on
//! the other end owns overlays, dialogs and process control.

use crate::intervention::{AppLifecycle, InterventionError, Presenter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// A request for the platform shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OutboundCommand {
    ShowNudge {
        message: String,
    },
    ShowLaunchDelay {
        package: String,
        relaunch_after_ms: u64,
    },
    TerminateBackground {
        package: String,
    },
    Relaunch {
        package: String,
    },
}

/// One written line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: Uuid,
    pub issued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub command: OutboundCommand,
}

/// Writes commands as JSON lines and implements both outbound ports.
pub struct CommandSink {
    writer: Mutex<Box<dyn Write + Send>>,
    overlay_permitted: AtomicBool,
}

impl CommandSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            overlay_permitted: AtomicBool::new(true),
        }
    }

    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Whether the shim may draw over other apps. Nudges fail while false.
    pub fn set_overlay_permitted(&self, permitted: bool) {
        self.overlay_permitted.store(permitted, Ordering::SeqCst);
    }

    pub fn overlay_permitted(&self) -> bool {
        self.overlay_permitted.load(Ordering::SeqCst)
    }

    /// Serialize and write one command.
    pub fn emit(&self, command: OutboundCommand) -> std::io::Result<()> {
        let envelope = CommandEnvelope {
            id: Uuid::new_v4(),
            issued_at: Utc::now(),
            command,
        };
        let line = serde_json::to_string(&envelope).map_err(std::io::Error::other)?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl Presenter for CommandSink {
    fn show_nudge(&self, message: &str) -> Result<(), InterventionError> {
        if !self.overlay_permitted() {
            return Err(InterventionError::PresentationUnavailable(
                "overlay permission not granted".to_string(),
            ));
        }
        self.emit(OutboundCommand::ShowNudge {
            message: message.to_string(),
        })
        .map_err(|e| InterventionError::PresentationUnavailable(e.to_string()))
    }

    fn show_launch_delay(
        &self,
        package_name: &str,
        relaunch_after: Duration,
    ) -> Result<(), InterventionError> {
        self.emit(OutboundCommand::ShowLaunchDelay {
            package: package_name.to_string(),
            relaunch_after_ms: relaunch_after.as_millis() as u64,
        })
        .map_err(|e| InterventionError::PresentationUnavailable(e.to_string()))
    }
}

impl AppLifecycle for CommandSink {
    fn terminate_background(&self, package_name: &str) -> Result<(), InterventionError> {
        self.emit(OutboundCommand::TerminateBackground {
            package: package_name.to_string(),
        })
        .map_err(|e| InterventionError::Lifecycle(e.to_string()))
    }

    fn relaunch(&self, package_name: &str) -> Result<(), InterventionError> {
        self.emit(OutboundCommand::Relaunch {
            package: package_name.to_string(),
        })
        .map_err(|e| InterventionError::Lifecycle(e.to_string()))
    }
}
