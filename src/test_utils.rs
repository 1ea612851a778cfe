//! Shared test utilities for the lock core.
//!
//! This module provides store setup and fake platform collaborators used
//! across test modules.

#![cfg(test)]

use crate::cache::LockedSetCache;
use crate::config::FailPolicy;
use crate::error::LockerError;
use crate::gate::{LockGate, LockTicket};
use crate::models::{AppId, InstalledApp, LockOutcome};
use crate::platform::{AppCatalog, LockPresenter, Permissions, UsageEvent, UsageEvents};
use crate::store::{ChangeListener, Listeners, PreferenceStore, SqlitePreferenceStore, SubscriptionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

/// Create a preference store on a temporary database.
///
/// Returns a tuple of (store, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the database file from being deleted.
pub fn setup_test_store() -> (SqlitePreferenceStore, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test store");
    let db_path = dir.path().join("prefs.db");
    let store = SqlitePreferenceStore::open(&db_path).expect("Failed to open test store");
    (store, dir)
}

/// A store whose backing database can never be opened.
#[derive(Default)]
pub struct UnavailableStore {
    listeners: Listeners,
}

fn cannot_open() -> LockerError {
    // SQLITE_CANTOPEN
    LockerError::StoreUnavailable(rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(14), None))
}

impl PreferenceStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<bool, LockerError> {
        Err(cannot_open())
    }

    fn set(&self, _key: &str, _value: bool) -> Result<(), LockerError> {
        Err(cannot_open())
    }

    fn get_all(&self) -> Result<HashMap<String, bool>, LockerError> {
        Err(cannot_open())
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}

/// Store that writes `key = true` once, right after its first full scan,
/// as when the settings screen toggles a lock while the service starts.
pub struct LateWriteStore {
    inner: SqlitePreferenceStore,
    key: &'static str,
    written: AtomicBool,
}

impl LateWriteStore {
    pub fn new(inner: SqlitePreferenceStore, key: &'static str) -> Self {
        Self { inner, key, written: AtomicBool::new(false) }
    }
}

impl PreferenceStore for LateWriteStore {
    fn get(&self, key: &str) -> Result<bool, LockerError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: bool) -> Result<(), LockerError> {
        self.inner.set(key, value)
    }

    fn get_all(&self) -> Result<HashMap<String, bool>, LockerError> {
        let all = self.inner.get_all()?;
        if !self.written.swap(true, Ordering::SeqCst) {
            self.inner.set(self.key, true)?;
        }
        Ok(all)
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id);
    }
}

pub struct FakePermissions {
    usage: AtomicBool,
    overlay: AtomicBool,
}

impl FakePermissions {
    pub fn granted() -> Self {
        Self {
            usage: AtomicBool::new(true),
            overlay: AtomicBool::new(true),
        }
    }

    pub fn set(&self, usage: bool, overlay: bool) {
        self.usage.store(usage, Ordering::SeqCst);
        self.overlay.store(overlay, Ordering::SeqCst);
    }
}

impl Permissions for FakePermissions {
    fn has_usage_access(&self) -> bool {
        self.usage.load(Ordering::SeqCst)
    }

    fn has_overlay_access(&self) -> bool {
        self.overlay.load(Ordering::SeqCst)
    }
}

/// Presenter that records every request and keeps the tickets for the test
/// to resolve.
#[derive(Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<AppId>>,
    tickets: Mutex<Vec<LockTicket>>,
    fail_next: AtomicBool,
    home: AtomicUsize,
}

impl RecordingPresenter {
    pub fn presented_apps(&self) -> Vec<AppId> {
        self.presented.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn home_count(&self) -> usize {
        self.home.load(Ordering::SeqCst)
    }

    pub fn resolve_all(&self, outcome: LockOutcome) {
        let tickets: Vec<LockTicket> = self.tickets.lock().unwrap().drain(..).collect();
        for ticket in tickets {
            ticket.resolve(outcome);
        }
    }

    pub fn resolve_first(&self, outcome: LockOutcome) {
        let mut tickets = self.tickets.lock().unwrap();
        if !tickets.is_empty() {
            tickets.remove(0).resolve(outcome);
        }
    }

    pub fn drop_all(&self) {
        self.tickets.lock().unwrap().clear();
    }
}

impl LockPresenter for RecordingPresenter {
    fn present(&self, ticket: LockTicket) -> Result<(), LockerError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LockerError::Presentation("overlay permission revoked".into()));
        }
        self.presented.lock().unwrap().push(ticket.app().clone());
        self.tickets.lock().unwrap().push(ticket);
        Ok(())
    }

    fn show_home(&self) -> Result<(), LockerError> {
        self.home.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns a fixed event list and counts how often it was queried.
pub struct CountingUsageEvents {
    events: Vec<UsageEvent>,
    queries: AtomicUsize,
}

impl CountingUsageEvents {
    pub fn new(events: Vec<UsageEvent>) -> Self {
        Self { events, queries: AtomicUsize::new(0) }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl UsageEvents for CountingUsageEvents {
    fn events_in_window(&self, start_ms: i64, end_ms: i64) -> Result<Vec<UsageEvent>, LockerError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .events
            .iter()
            .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms < end_ms)
            .cloned()
            .collect())
    }
}

/// Usage source that always fails, as when usage access is revoked mid-run.
pub struct FailingUsageEvents;

impl UsageEvents for FailingUsageEvents {
    fn events_in_window(&self, _start_ms: i64, _end_ms: i64) -> Result<Vec<UsageEvent>, LockerError> {
        Err(LockerError::Query("usage stats unavailable".into()))
    }
}

pub struct StaticCatalog(pub Vec<InstalledApp>);

impl AppCatalog for StaticCatalog {
    fn installed_apps(&self) -> Result<Vec<InstalledApp>, LockerError> {
        Ok(self.0.clone())
    }
}

/// A lock gate over a temporary store with `locked` apps set, all
/// permissions granted and a recording presenter.
pub struct TestGate {
    pub gate: Arc<LockGate>,
    pub presenter: Arc<RecordingPresenter>,
    pub permissions: Arc<FakePermissions>,
    pub dir: TempDir,
}

pub fn test_gate(locked: &[&str]) -> TestGate {
    let (store, dir) = setup_test_store();
    for app in locked {
        store.set(app, true).expect("Failed to seed test store");
    }

    let cache = Arc::new(LockedSetCache::new(Arc::new(store), FailPolicy::Open));
    cache.reload().expect("Failed to load test cache");

    let presenter = Arc::new(RecordingPresenter::default());
    let permissions = Arc::new(FakePermissions::granted());
    let gate = Arc::new(LockGate::new(
        AppId::new("com.applock"),
        cache,
        Arc::clone(&permissions) as Arc<dyn Permissions>,
        Arc::clone(&presenter) as Arc<dyn LockPresenter>,
    ));

    TestGate { gate, presenter, permissions, dir }
}
