pub mod app;

pub use app::{AppEntry, AppId, ForegroundObservation, InstalledApp, LockOutcome};
pub(crate) use app::current_timestamp_ms;
