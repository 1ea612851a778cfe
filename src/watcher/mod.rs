pub mod accessibility;
pub mod polling;

pub use accessibility::AccessibilityWatcher;
pub use polling::{poll_once, PollingConfig, PollingWatcher, TickOutcome};

use crate::config::WatcherStrategy;
use crate::error::LockerError;

/// Common lifecycle of both foreground detectors.
pub trait Watcher: Send {
    fn start(&mut self) -> Result<(), LockerError>;
    /// Stop detection. In-flight cycles finish before this returns.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn strategy(&self) -> WatcherStrategy;
}

/// The detector selected by configuration.
pub enum ForegroundWatcher {
    Accessibility(AccessibilityWatcher),
    Polling(PollingWatcher),
}

impl ForegroundWatcher {
    pub fn accessibility(&self) -> Option<&AccessibilityWatcher> {
        match self {
            ForegroundWatcher::Accessibility(w) => Some(w),
            ForegroundWatcher::Polling(_) => None,
        }
    }

    fn inner(&self) -> &dyn Watcher {
        match self {
            ForegroundWatcher::Accessibility(w) => w,
            ForegroundWatcher::Polling(w) => w,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Watcher {
        match self {
            ForegroundWatcher::Accessibility(w) => w,
            ForegroundWatcher::Polling(w) => w,
        }
    }
}

impl Watcher for ForegroundWatcher {
    fn start(&mut self) -> Result<(), LockerError> {
        self.inner_mut().start()
    }

    fn stop(&mut self) {
        self.inner_mut().stop();
    }

    fn is_running(&self) -> bool {
        self.inner().is_running()
    }

    fn strategy(&self) -> WatcherStrategy {
        self.inner().strategy()
    }
}
