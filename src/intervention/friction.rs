//! Launch friction for target apps.
//!
//! Every poll looks back over the recent usage log for RESUMED events of
//! target apps. Each new launch kills the app's process straight away and
//! relaunches it after a short delay. The look-back window overlaps between
//! polls, so the same RESUMED record is seen several times; the per-app
//! cooldown (compared on event timestamps) filters those repeats together
//! with genuine double launches.

use crate::collector::types::AppUsageEventType;
use crate::collector::usage_log::UsageStatsSource;
use crate::collector::CollectorError;
use crate::intervention::{AppLifecycle, CooldownTable, Presenter};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Apps that receive launch friction by default.
pub const DEFAULT_TARGET_PACKAGES: &[&str] = &[
    "com.instagram.android",
    "com.facebook.katana",
    "com.twitter.android",
    "com.snapchat.android",
    "com.tiktok.android",
];

pub const DEFAULT_LOOKBACK: std::time::Duration = std::time::Duration::from_millis(1_000);
pub const DEFAULT_LAUNCH_COOLDOWN: std::time::Duration = std::time::Duration::from_millis(500);
pub const DEFAULT_RELAUNCH_DELAY: std::time::Duration = std::time::Duration::from_millis(1_000);

/// Result of handling one RESUMED record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrictionOutcome {
    /// Terminated now, relaunch scheduled
    Applied { package_name: String },
    /// Within the launch cooldown of the last action for this app
    Duplicate { package_name: String },
    /// The resume caused by our own relaunch
    OwnRelaunch { package_name: String },
}

/// Tuning for [`LaunchFrictionController`].
#[derive(Debug, Clone)]
pub struct FrictionSettings {
    pub targets: BTreeSet<String>,
    pub lookback: std::time::Duration,
    pub launch_cooldown: std::time::Duration,
    pub relaunch_delay: std::time::Duration,
}

impl Default for FrictionSettings {
    fn default() -> Self {
        Self {
            targets: DEFAULT_TARGET_PACKAGES.iter().map(|p| p.to_string()).collect(),
            lookback: DEFAULT_LOOKBACK,
            launch_cooldown: DEFAULT_LAUNCH_COOLDOWN,
            relaunch_delay: DEFAULT_RELAUNCH_DELAY,
        }
    }
}

/// Polls for target-app launches and applies terminate-then-relaunch.
pub struct LaunchFrictionController {
    settings: FrictionSettings,
    cooldown: CooldownTable,
    /// Per-app windows, oldest first, in which a RESUMED is the echo of one
    /// of our relaunches
    pending_relaunch: Mutex<HashMap<String, VecDeque<(DateTime<Utc>, DateTime<Utc>)>>>,
    source: Arc<dyn UsageStatsSource>,
    presenter: Arc<dyn Presenter>,
    lifecycle: Arc<dyn AppLifecycle>,
    transparency: SharedTransparencyLog,
}

impl LaunchFrictionController {
    pub fn new(
        settings: FrictionSettings,
        source: Arc<dyn UsageStatsSource>,
        presenter: Arc<dyn Presenter>,
        lifecycle: Arc<dyn AppLifecycle>,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            cooldown: CooldownTable::new(settings.launch_cooldown),
            settings,
            pending_relaunch: Mutex::new(HashMap::new()),
            source,
            presenter,
            lifecycle,
            transparency,
        }
    }

    pub fn settings(&self) -> &FrictionSettings {
        &self.settings
    }

    pub fn is_target(&self, package_name: &str) -> bool {
        self.settings.targets.contains(package_name)
    }

    /// Examine the look-back window ending at `now`.
    ///
    /// Must be called from within a tokio runtime: relaunches are scheduled
    /// as delayed tasks so the poll itself never waits.
    pub fn poll(&self, now: DateTime<Utc>) -> Result<Vec<FrictionOutcome>, CollectorError> {
        let lookback = Duration::milliseconds(self.settings.lookback.as_millis() as i64);
        let events = self.source.query_events(now - lookback, now)?;

        Ok(events
            .iter()
            .filter(|e| e.event_type == AppUsageEventType::Resumed && self.is_target(&e.package_name))
            .map(|e| self.handle_launch(&e.package_name, e.timestamp))
            .collect())
    }

    /// Apply friction to one launch observed at `launched_at`.
    pub fn handle_launch(&self, package_name: &str, launched_at: DateTime<Utc>) -> FrictionOutcome {
        let package = package_name.to_string();

        if self.consume_own_relaunch(package_name, launched_at) {
            // Later polls still see this record; the cooldown filters them.
            self.cooldown.try_acquire(package_name, launched_at);
            tracing::debug!(package = package_name, "Ignoring resume from our relaunch");
            return FrictionOutcome::OwnRelaunch {
                package_name: package,
            };
        }

        if !self.cooldown.try_acquire(package_name, launched_at) {
            tracing::trace!(package = package_name, "Ignoring duplicate launch");
            return FrictionOutcome::Duplicate {
                package_name: package,
            };
        }

        // The relaunch still goes ahead if the app could not be stopped.
        if let Err(e) = self.lifecycle.terminate_background(package_name) {
            tracing::warn!(package = package_name, "Could not terminate app: {e}");
        }

        let delay = self.settings.relaunch_delay;
        if let Err(e) = self.presenter.show_launch_delay(package_name, delay) {
            tracing::warn!(package = package_name, "Launch delay screen not shown: {e}");
        }

        self.expect_relaunch(package_name, launched_at);
        self.transparency.record_friction_action();
        tracing::info!(
            package = package_name,
            delay_ms = delay.as_millis() as u64,
            "Added launch friction"
        );

        let lifecycle = self.lifecycle.clone();
        let relaunched = package.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match lifecycle.relaunch(&relaunched) {
                Ok(()) => tracing::debug!(package = %relaunched, "Relaunched after delay"),
                Err(e) => tracing::warn!(package = %relaunched, "Relaunch failed: {e}"),
            }
        });

        FrictionOutcome::Applied {
            package_name: package,
        }
    }

    fn expect_relaunch(&self, package_name: &str, launched_at: DateTime<Utc>) {
        let delay = Duration::milliseconds(self.settings.relaunch_delay.as_millis() as i64);
        let lookback = Duration::milliseconds(self.settings.lookback.as_millis() as i64);
        // The relaunch happens one delay after the poll that saw the launch,
        // and that poll is at most one look-back after the launch itself.
        let from = launched_at + delay;
        let until = from + lookback + delay;
        self.pending_relaunch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(package_name.to_string())
            .or_default()
            .push_back((from, until));
    }

    /// Match a RESUMED against the oldest outstanding relaunch window.
    fn consume_own_relaunch(&self, package_name: &str, resumed_at: DateTime<Utc>) -> bool {
        let mut pending = self
            .pending_relaunch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(windows) = pending.get_mut(package_name) else {
            return false;
        };

        while windows.front().is_some_and(|(_, until)| resumed_at > *until) {
            windows.pop_front();
        }
        let matched = windows
            .front()
            .is_some_and(|(from, until)| resumed_at >= *from && resumed_at <= *until);
        if matched {
            windows.pop_front();
        }
        if windows.is_empty() {
            pending.remove(package_name);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::AppUsageEvent;
    use crate::collector::usage_log::UsageLog;
    use crate::intervention::InterventionError;
    use crate::transparency::create_shared_log;

    const INSTAGRAM: &str = "com.instagram.android";

    #[derive(Default)]
    struct RecordingLifecycle {
        calls: std::sync::Mutex<Vec<String>>,
        terminate_fails: std::sync::atomic::AtomicBool,
    }

    impl AppLifecycle for RecordingLifecycle {
        fn terminate_background(&self, package_name: &str) -> Result<(), InterventionError> {
            self.calls.lock().unwrap().push(format!("terminate {package_name}"));
            if self.terminate_fails.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(InterventionError::Lifecycle("process not found".to_string()));
            }
            Ok(())
        }

        fn relaunch(&self, package_name: &str) -> Result<(), InterventionError> {
            self.calls.lock().unwrap().push(format!("relaunch {package_name}"));
            Ok(())
        }
    }

    impl Presenter for RecordingLifecycle {
        fn show_nudge(&self, _: &str) -> Result<(), InterventionError> {
            Ok(())
        }

        fn show_launch_delay(
            &self,
            package_name: &str,
            _: std::time::Duration,
        ) -> Result<(), InterventionError> {
            self.calls.lock().unwrap().push(format!("delay {package_name}"));
            Ok(())
        }
    }

    fn setup() -> (Arc<UsageLog>, Arc<RecordingLifecycle>, LaunchFrictionController) {
        let log = Arc::new(UsageLog::new());
        let recorder = Arc::new(RecordingLifecycle::default());
        let controller = LaunchFrictionController::new(
            FrictionSettings::default(),
            log.clone(),
            recorder.clone(),
            recorder.clone(),
            create_shared_log(),
        );
        (log, recorder, controller)
    }

    fn count(recorder: &RecordingLifecycle, prefix: &str) -> usize {
        recorder
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn resumed(package: &str, at: DateTime<Utc>) -> AppUsageEvent {
        AppUsageEvent::new(package, AppUsageEventType::Resumed, at)
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_200ms_apart_get_one_friction() {
        let (log, recorder, controller) = setup();
        let t0 = Utc::now();
        log.record(resumed(INSTAGRAM, t0));
        log.record(resumed(INSTAGRAM, t0 + Duration::milliseconds(200)));

        let outcomes = controller.poll(t0 + Duration::milliseconds(300)).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[1], FrictionOutcome::Duplicate { .. }));

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        assert_eq!(count(&recorder, "terminate"), 1);
        assert_eq!(count(&recorder, "relaunch"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_600ms_apart_get_two_frictions() {
        let (log, recorder, controller) = setup();
        let t0 = Utc::now();
        log.record(resumed(INSTAGRAM, t0));
        log.record(resumed(INSTAGRAM, t0 + Duration::milliseconds(600)));

        controller.poll(t0 + Duration::milliseconds(700)).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        assert_eq!(count(&recorder, "terminate"), 2);
        assert_eq!(count(&recorder, "relaunch"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_polls_see_each_launch_once() {
        let (log, recorder, controller) = setup();
        let t0 = Utc::now();
        log.record(resumed(INSTAGRAM, t0));

        for step in 1..=9 {
            controller.poll(t0 + Duration::milliseconds(100 * step)).unwrap();
        }
        assert_eq!(count(&recorder, "terminate"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relaunch_waits_for_delay() {
        let (log, recorder, controller) = setup();
        let t0 = Utc::now();
        log.record(resumed(INSTAGRAM, t0));

        controller.poll(t0 + Duration::milliseconds(100)).unwrap();
        assert_eq!(count(&recorder, "terminate"), 1);
        assert_eq!(count(&recorder, "delay"), 1);

        tokio::time::sleep(std::time::Duration::from_millis(900)).await;
        assert_eq!(count(&recorder, "relaunch"), 0);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(count(&recorder, "relaunch"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_relaunch_is_not_treated_as_launch() {
        let (_, recorder, controller) = setup();
        let t0 = Utc::now();

        controller.handle_launch(INSTAGRAM, t0);
        let echo = controller.handle_launch(INSTAGRAM, t0 + Duration::milliseconds(1_150));
        assert!(matches!(echo, FrictionOutcome::OwnRelaunch { .. }));
        let seen_again = controller.handle_launch(INSTAGRAM, t0 + Duration::milliseconds(1_150));
        assert!(matches!(seen_again, FrictionOutcome::Duplicate { .. }));

        // A later real launch is handled again.
        let next = controller.handle_launch(INSTAGRAM, t0 + Duration::seconds(10));
        assert!(matches!(next, FrictionOutcome::Applied { .. }));
        assert_eq!(count(&recorder, "terminate"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_echoes_of_two_relaunches_are_both_ignored() {
        let (_, recorder, controller) = setup();
        let t0 = Utc::now();

        controller.handle_launch(INSTAGRAM, t0);
        controller.handle_launch(INSTAGRAM, t0 + Duration::milliseconds(600));

        for echo_ms in [1_150, 1_750] {
            let outcome = controller.handle_launch(INSTAGRAM, t0 + Duration::milliseconds(echo_ms));
            assert!(
                matches!(outcome, FrictionOutcome::OwnRelaunch { .. }),
                "echo at {echo_ms}ms: {outcome:?}"
            );
        }
        // Re-reading the first echo in a later, overlapping poll.
        let repeat = controller.handle_launch(INSTAGRAM, t0 + Duration::milliseconds(1_150));
        assert!(matches!(repeat, FrictionOutcome::Duplicate { .. }));

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        assert_eq!(count(&recorder, "terminate"), 2);
        assert_eq!(count(&recorder, "relaunch"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relaunch_follows_failed_terminate() {
        let (_, recorder, controller) = setup();
        recorder
            .terminate_fails
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let outcome = controller.handle_launch(INSTAGRAM, Utc::now());
        assert!(matches!(outcome, FrictionOutcome::Applied { .. }));

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                format!("terminate {INSTAGRAM}"),
                format!("delay {INSTAGRAM}"),
                format!("relaunch {INSTAGRAM}"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_targets_are_ignored() {
        let (log, recorder, controller) = setup();
        let t0 = Utc::now();
        log.record(resumed("com.example.notes", t0));

        assert!(controller.poll(t0 + Duration::milliseconds(100)).unwrap().is_empty());
        assert_eq!(count(&recorder, "terminate"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_surfaces() {
        let (log, _, controller) = setup();
        log.set_permission(false);
        assert!(matches!(
            controller.poll(Utc::now()),
            Err(CollectorError::PermissionDenied)
        ));
    }
}
