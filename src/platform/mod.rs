pub mod types;

pub use types::{
    AppCatalog, EventKind, LockPresenter, Permissions, UsageEvent, UsageEvents, WindowEvent,
};

use crate::error::LockerError;
use crate::safe_lock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Permission state pushed in by the platform shell.
#[derive(Debug, Default)]
pub struct PermissionFlags {
    usage: AtomicBool,
    overlay: AtomicBool,
}

impl PermissionFlags {
    pub fn new(usage: bool, overlay: bool) -> Self {
        Self {
            usage: AtomicBool::new(usage),
            overlay: AtomicBool::new(overlay),
        }
    }

    pub fn update(&self, usage: bool, overlay: bool) {
        self.usage.store(usage, Ordering::SeqCst);
        self.overlay.store(overlay, Ordering::SeqCst);
    }
}

impl Permissions for PermissionFlags {
    fn has_usage_access(&self) -> bool {
        self.usage.load(Ordering::SeqCst)
    }

    fn has_overlay_access(&self) -> bool {
        self.overlay.load(Ordering::SeqCst)
    }
}

/// Usage events reported by the platform shell, kept for a bounded horizon so
/// the polling watcher can query trailing windows.
pub struct RecordedUsageEvents {
    horizon_ms: i64,
    events: Mutex<VecDeque<UsageEvent>>,
}

impl RecordedUsageEvents {
    pub fn new(horizon_ms: i64) -> Self {
        Self {
            horizon_ms,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an event, dropping anything older than the horizon relative to it.
    pub fn record(&self, event: UsageEvent) {
        let mut events = safe_lock(&self.events, "Usage event log");
        let cutoff = event.timestamp_ms.saturating_sub(self.horizon_ms);
        while events.front().is_some_and(|e| e.timestamp_ms < cutoff) {
            events.pop_front();
        }

        // Keep the log ordered even if the shell delivers slightly out of order
        let pos = events
            .iter()
            .rposition(|e| e.timestamp_ms <= event.timestamp_ms)
            .map_or(0, |p| p + 1);
        events.insert(pos, event);
    }

    pub fn len(&self) -> usize {
        safe_lock(&self.events, "Usage event log").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UsageEvents for RecordedUsageEvents {
    fn events_in_window(&self, start_ms: i64, end_ms: i64) -> Result<Vec<UsageEvent>, LockerError> {
        Ok(safe_lock(&self.events, "Usage event log")
            .iter()
            .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms < end_ms)
            .cloned()
            .collect())
    }
}
