//! Soft nudges for distracted windows.

use crate::classifier::BehaviorInsights;
use crate::core::reasoner::BehaviorPattern;
use crate::intervention::{CooldownTable, InterventionError, Presenter};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Default minimum interval between nudges.
pub const DEFAULT_NUDGE_COOLDOWN: Duration = Duration::from_secs(15 * 60);

const NUDGE_KEY: &str = "nudge";

/// What happened when a window was considered for a nudge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NudgeOutcome {
    /// The window was not distracted, or no break was suggested
    NotWarranted,
    /// A nudge was shown too recently
    CoolingDown,
    Shown { message: String },
    /// Presentation was unavailable; the cooldown was not consumed
    Deferred { reason: String },
}

/// Decides when to show a nudge and asks the presenter to show it.
pub struct NudgeController {
    cooldown: CooldownTable,
    presenter: Arc<dyn Presenter>,
    transparency: SharedTransparencyLog,
}

impl NudgeController {
    pub fn new(
        cooldown: Duration,
        presenter: Arc<dyn Presenter>,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            cooldown: CooldownTable::new(cooldown),
            presenter,
            transparency,
        }
    }

    /// Whether a nudge could be shown at `now` as far as the cooldown goes.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.cooldown.is_ready(NUDGE_KEY, now)
    }

    /// Show a nudge if the window is distracted, a break is suggested and the
    /// cooldown has elapsed.
    pub fn consider(
        &self,
        pattern: &BehaviorPattern,
        insights: &BehaviorInsights,
        now: DateTime<Utc>,
    ) -> NudgeOutcome {
        let Some(message) = pattern.distraction_reason() else {
            return NudgeOutcome::NotWarranted;
        };
        if !insights.suggests_break {
            return NudgeOutcome::NotWarranted;
        }

        match self
            .cooldown
            .fire_if_ready(NUDGE_KEY, now, || self.presenter.show_nudge(message))
        {
            Ok(true) => {
                tracing::info!(nudge = message, "Nudge shown");
                self.transparency.record_nudge_shown();
                NudgeOutcome::Shown {
                    message: message.to_string(),
                }
            }
            Ok(false) => {
                tracing::debug!("Nudge suppressed by cooldown");
                NudgeOutcome::CoolingDown
            }
            Err(InterventionError::PresentationUnavailable(reason)) => {
                tracing::warn!(%reason, "Nudge deferred: presentation unavailable");
                self.transparency.record_nudge_deferred();
                NudgeOutcome::Deferred { reason }
            }
            Err(e) => {
                tracing::warn!("Nudge deferred: {e}");
                self.transparency.record_nudge_deferred();
                NudgeOutcome::Deferred {
                    reason: e.to_string(),
                }
            }
        }
    }
}
