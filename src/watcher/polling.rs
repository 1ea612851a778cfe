use super::Watcher;
use crate::config::WatcherStrategy;
use crate::error::LockerError;
use crate::gate::{GateAction, LockGate};
use crate::models::{current_timestamp_ms, ForegroundObservation};
use crate::platform::{EventKind, Permissions, UsageEvents};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct PollingConfig {
    pub interval: Duration,
    pub lookback: Duration,
}

/// Result of one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Usage or overlay access missing; no query was made
    PermissionMissing,
    /// The usage query failed; retried next tick
    QueryFailed,
    /// No foreground event in the trailing window
    NoForegroundEvent,
    Evaluated(GateAction),
}

/// Run a single detection cycle ending at `now_ms`.
pub fn poll_once(
    source: &dyn UsageEvents,
    permissions: &dyn Permissions,
    gate: &LockGate,
    lookback: Duration,
    now_ms: i64,
) -> TickOutcome {
    if !permissions.has_usage_access() || !permissions.has_overlay_access() {
        return TickOutcome::PermissionMissing;
    }

    gate.process_outcomes();

    let lookback_ms = i64::try_from(lookback.as_millis()).unwrap_or(i64::MAX);
    let start_ms = now_ms.saturating_sub(lookback_ms);
    let events = match source.events_in_window(start_ms, now_ms) {
        Ok(events) => events,
        Err(e) => {
            warn!("Usage query failed, skipping cycle: {e}");
            return TickOutcome::QueryFailed;
        }
    };

    let Some(latest) = events
        .into_iter()
        .rev()
        .find(|e| e.kind == EventKind::MoveToForeground)
    else {
        return TickOutcome::NoForegroundEvent;
    };

    TickOutcome::Evaluated(
        gate.on_foreground_transition(ForegroundObservation::new(latest.app, latest.timestamp_ms)),
    )
}

/// Watcher that queries the usage log on a fixed cadence from a background
/// thread. Up to one interval of latency; rapid switches inside one window
/// collapse to the last one.
pub struct PollingWatcher {
    config: PollingConfig,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    source: Arc<dyn UsageEvents>,
    permissions: Arc<dyn Permissions>,
    gate: Arc<LockGate>,
}

impl PollingWatcher {
    pub fn new(
        gate: Arc<LockGate>,
        source: Arc<dyn UsageEvents>,
        permissions: Arc<dyn Permissions>,
        config: PollingConfig,
    ) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            source,
            permissions,
            gate,
        }
    }
}

impl Watcher for PollingWatcher {
    fn start(&mut self) -> Result<(), LockerError> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let source = Arc::clone(&self.source);
        let permissions = Arc::clone(&self.permissions);
        let gate = Arc::clone(&self.gate);
        let interval = self.config.interval;
        let lookback = self.config.lookback;

        let spawned = thread::Builder::new()
            .name("applock-poller".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let outcome = poll_once(
                        source.as_ref(),
                        permissions.as_ref(),
                        &gate,
                        lookback,
                        current_timestamp_ms(),
                    );
                    debug!("Poll cycle: {outcome:?}");

                    thread::sleep(interval);
                }
            });

        match spawned {
            Ok(handle) => {
                info!("Polling watcher started ({} ms interval)", interval.as_millis());
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(LockerError::Startup(format!("could not spawn poller thread: {e}")))
            }
        }
    }

    /// Signal the loop and wait for the in-flight cycle to finish.
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Poller thread panicked");
            }
            info!("Polling watcher stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn strategy(&self) -> WatcherStrategy {
        WatcherStrategy::Polling
    }
}

impl Drop for PollingWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppId;
    use crate::platform::{RecordedUsageEvents, UsageEvent};
    use crate::test_utils::{test_gate, CountingUsageEvents, FailingUsageEvents};

    const LOOKBACK: Duration = Duration::from_millis(1000);

    fn event(kind: EventKind, app: &str, ts: i64) -> UsageEvent {
        UsageEvent { kind, app: AppId::new(app), timestamp_ms: ts }
    }

    #[test]
    fn test_last_foreground_event_wins() {
        let t = test_gate(&["com.b"]);
        let log = RecordedUsageEvents::new(60_000);
        log.record(event(EventKind::MoveToForeground, "com.a", 9_100));
        log.record(event(EventKind::MoveToForeground, "com.b", 9_500));
        log.record(event(EventKind::MoveToBackground, "com.b", 9_800));

        let outcome = poll_once(&log, t.permissions.as_ref(), &t.gate, LOOKBACK, 10_000);
        assert!(matches!(outcome, TickOutcome::Evaluated(GateAction::LockPresented { .. })));
        assert_eq!(t.presenter.presented_apps(), vec![AppId::new("com.b")]);
    }

    #[test]
    fn test_events_outside_window_ignored() {
        let t = test_gate(&["com.a"]);
        let log = RecordedUsageEvents::new(60_000);
        log.record(event(EventKind::MoveToForeground, "com.a", 8_000));

        let outcome = poll_once(&log, t.permissions.as_ref(), &t.gate, LOOKBACK, 10_000);
        assert_eq!(outcome, TickOutcome::NoForegroundEvent);
        assert!(t.presenter.presented_apps().is_empty());
    }

    #[test]
    fn test_repeated_ticks_present_once() {
        let t = test_gate(&["com.a"]);
        let log = RecordedUsageEvents::new(60_000);
        log.record(event(EventKind::MoveToForeground, "com.a", 9_900));

        poll_once(&log, t.permissions.as_ref(), &t.gate, LOOKBACK, 10_000);
        let second = poll_once(&log, t.permissions.as_ref(), &t.gate, LOOKBACK, 10_300);
        assert_eq!(second, TickOutcome::Evaluated(GateAction::Duplicate));
        assert_eq!(t.presenter.presented_apps().len(), 1);
    }

    #[test]
    fn test_query_failure_skips_cycle() {
        let t = test_gate(&["com.a"]);
        let outcome = poll_once(&FailingUsageEvents, t.permissions.as_ref(), &t.gate, LOOKBACK, 10_000);
        assert_eq!(outcome, TickOutcome::QueryFailed);
        assert!(t.presenter.presented_apps().is_empty());
    }

    #[test]
    fn test_no_queries_without_permission() {
        let t = test_gate(&["com.a"]);
        t.permissions.set(false, true);
        let source = CountingUsageEvents::new(vec![event(EventKind::MoveToForeground, "com.a", 9_900)]);

        for now in [10_000, 10_300, 10_600] {
            assert_eq!(
                poll_once(&source, t.permissions.as_ref(), &t.gate, LOOKBACK, now),
                TickOutcome::PermissionMissing
            );
        }
        assert_eq!(source.queries(), 0);
        assert!(t.presenter.presented_apps().is_empty());

        t.permissions.set(true, true);
        let outcome = poll_once(&source, t.permissions.as_ref(), &t.gate, LOOKBACK, 10_000);
        assert!(matches!(outcome, TickOutcome::Evaluated(GateAction::LockPresented { .. })));
        assert_eq!(source.queries(), 1);
    }

    #[test]
    fn test_watcher_starts_and_stops() {
        let t = test_gate(&["com.a"]);
        let source = Arc::new(CountingUsageEvents::new(Vec::new()));
        let mut watcher = PollingWatcher::new(
            Arc::clone(&t.gate),
            Arc::clone(&source) as Arc<dyn UsageEvents>,
            Arc::clone(&t.permissions) as Arc<dyn Permissions>,
            PollingConfig {
                interval: Duration::from_millis(10),
                lookback: LOOKBACK,
            },
        );

        assert!(!watcher.is_running());
        watcher.start().unwrap();
        assert!(watcher.is_running());

        thread::sleep(Duration::from_millis(100));

        watcher.stop();
        assert!(!watcher.is_running());
        assert!(source.queries() > 0);

        // No further cycles after stop returns
        let after_stop = source.queries();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(source.queries(), after_stop);
    }

    #[test]
    fn test_watcher_detects_live_switch() {
        let t = test_gate(&["com.a"]);
        let log = Arc::new(RecordedUsageEvents::new(60_000));
        let mut watcher = PollingWatcher::new(
            Arc::clone(&t.gate),
            Arc::clone(&log) as Arc<dyn UsageEvents>,
            Arc::clone(&t.permissions) as Arc<dyn Permissions>,
            PollingConfig {
                interval: Duration::from_millis(10),
                lookback: LOOKBACK,
            },
        );
        watcher.start().unwrap();

        log.record(event(EventKind::MoveToForeground, "com.a", current_timestamp_ms()));
        thread::sleep(Duration::from_millis(150));
        watcher.stop();

        assert_eq!(t.presenter.presented_apps(), vec![AppId::new("com.a")]);
    }
}
