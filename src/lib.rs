pub mod bridge;
pub mod cache;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gate;
pub mod models;
pub mod platform;
pub mod service;
pub mod settings;
pub mod store;
#[cfg(test)]
mod test_utils;
pub mod validation;
pub mod watcher;

pub use cache::LockedSetCache;
pub use config::{FailPolicy, LockerConfig, WatcherStrategy};
pub use error::LockerError;
pub use gate::{GateAction, LockGate, LockState, LockTicket};
pub use models::{AppId, ForegroundObservation, LockOutcome};
pub use service::{Collaborators, LockService};
pub use store::{PreferenceStore, SqlitePreferenceStore};

use log::warn;
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering from poisoning if necessary
pub(crate) fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
