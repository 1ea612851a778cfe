use crate::error::LockerError;
use crate::gate::LockTicket;
use crate::models::{AppId, InstalledApp};
use serde::{Deserialize, Serialize};

/// Kind of a platform window/usage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WindowStateChanged,
    MoveToForeground,
    MoveToBackground,
    /// Any kind the core does not act on
    #[serde(other)]
    Other,
}

/// An accessibility callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub kind: EventKind,
    /// Absent when the platform could not attribute the window to a package
    pub app: Option<AppId>,
    pub timestamp_ms: i64,
}

/// One entry of the platform usage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub kind: EventKind,
    pub app: AppId,
    pub timestamp_ms: i64,
}

/// Usage-tracking query used by the polling watcher.
pub trait UsageEvents: Send + Sync {
    /// Events with `start_ms <= timestamp < end_ms`, oldest first.
    fn events_in_window(&self, start_ms: i64, end_ms: i64) -> Result<Vec<UsageEvent>, LockerError>;
}

pub trait Permissions: Send + Sync {
    fn has_usage_access(&self) -> bool;
    fn has_overlay_access(&self) -> bool;
}

/// Surface that blocks an app until the user authenticates.
pub trait LockPresenter: Send + Sync {
    /// Show the lock screen. Returns as soon as the request is issued; the
    /// surface resolves `ticket` when the user authenticates or cancels.
    fn present(&self, ticket: LockTicket) -> Result<(), LockerError>;

    /// Route the user to a neutral screen after a cancelled unlock.
    fn show_home(&self) -> Result<(), LockerError>;
}

pub trait AppCatalog: Send + Sync {
    fn installed_apps(&self) -> Result<Vec<InstalledApp>, LockerError>;
}
