//! Rate-limited interventions.
//!
//! Two kinds of intervention are issued, each under its own cooldown policy:
//! soft nudges driven by window classification, and launch friction applied
//! to target apps as they come to the foreground. Both talk to the outside
//! world only through the [`Presenter`] and [`AppLifecycle`] ports.

pub mod cooldown;
pub mod friction;
pub mod nudge;
pub mod sink;

use std::time::Duration;
use thiserror::Error;

pub use cooldown::CooldownTable;
pub use friction::{FrictionOutcome, LaunchFrictionController};
pub use nudge::{NudgeController, NudgeOutcome};
pub use sink::{CommandSink, OutboundCommand};

/// Errors reported by the presentation and lifecycle ports.
#[derive(Debug, Error)]
pub enum InterventionError {
    #[error("Presentation unavailable: {0}")]
    PresentationUnavailable(String),

    #[error("App lifecycle command failed: {0}")]
    Lifecycle(String),
}

/// Presentation layer. Calls are fire-and-forget.
pub trait Presenter: Send + Sync {
    fn show_nudge(&self, message: &str) -> Result<(), InterventionError>;

    fn show_launch_delay(
        &self,
        package_name: &str,
        relaunch_after: Duration,
    ) -> Result<(), InterventionError>;
}

/// Control over other apps' processes.
pub trait AppLifecycle: Send + Sync {
    fn terminate_background(&self, package_name: &str) -> Result<(), InterventionError>;

    fn relaunch(&self, package_name: &str) -> Result<(), InterventionError>;
}
