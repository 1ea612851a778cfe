use super::Watcher;
use crate::config::WatcherStrategy;
use crate::error::LockerError;
use crate::gate::{GateAction, LockGate};
use crate::models::ForegroundObservation;
use crate::platform::{EventKind, WindowEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event-driven watcher: the platform calls [`on_event`](Self::on_event) for
/// every window-state change. Exact, no polling latency.
pub struct AccessibilityWatcher {
    gate: Arc<LockGate>,
    running: AtomicBool,
}

impl AccessibilityWatcher {
    pub fn new(gate: Arc<LockGate>) -> Self {
        Self {
            gate,
            running: AtomicBool::new(false),
        }
    }

    /// Feed one platform event. Returns `None` when the event is not a
    /// foreground transition or the watcher is stopped.
    pub fn on_event(&self, event: &WindowEvent) -> Option<GateAction> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        if event.kind != EventKind::WindowStateChanged {
            return None;
        }
        let app = event.app.clone()?;

        Some(
            self.gate
                .on_foreground_transition(ForegroundObservation::new(app, event.timestamp_ms)),
        )
    }
}

impl Watcher for AccessibilityWatcher {
    fn start(&mut self) -> Result<(), LockerError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn strategy(&self) -> WatcherStrategy {
        WatcherStrategy::Accessibility
    }
}
