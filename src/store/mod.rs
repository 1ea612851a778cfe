//! Durable app identifier -> locked flag map with change notification.

use crate::db::{migrations, Database};
use crate::error::LockerError;
use crate::safe_lock;
use log::{debug, warn};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Callback invoked with the key that changed.
pub type ChangeListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`PreferenceStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub trait PreferenceStore: Send + Sync {
    /// Stored flag for `key`, `false` when absent.
    fn get(&self, key: &str) -> Result<bool, LockerError>;
    fn set(&self, key: &str, value: bool) -> Result<(), LockerError>;
    fn get_all(&self) -> Result<HashMap<String, bool>, LockerError>;
    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Registered change listeners. Callbacks run without the registry lock held,
/// so a listener may unsubscribe itself.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, ChangeListener)>>,
}

impl Listeners {
    pub fn add(&self, listener: ChangeListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        safe_lock(&self.entries, "Listener registry").push((id, listener));
        id
    }

    pub fn remove(&self, id: SubscriptionId) {
        safe_lock(&self.entries, "Listener registry").retain(|(existing, _)| *existing != id);
    }

    pub fn notify(&self, key: &str) {
        let snapshot: Vec<ChangeListener> = safe_lock(&self.entries, "Listener registry")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(key);
        }
    }

    pub fn len(&self) -> usize {
        safe_lock(&self.entries, "Listener registry").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SQLite-backed preference store.
pub struct SqlitePreferenceStore {
    db: Mutex<Database>,
    listeners: Listeners,
}

impl SqlitePreferenceStore {
    pub fn open(path: &Path) -> Result<Self, LockerError> {
        let db = Database::open(path)?;
        migrations::run(db.connection())?;
        Ok(Self::from_database(db))
    }

    /// Wrap an already-migrated database.
    pub fn from_database(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            listeners: Listeners::default(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, key: &str) -> Result<bool, LockerError> {
        let db = safe_lock(&self.db, "Preference database");
        let value: Option<bool> = db
            .connection()
            .query_row(
                "SELECT value FROM app_lock_prefs WHERE key = ?1",
                params![key],
                |row| row.get::<_, i64>(0).map(|v| v != 0),
            )
            .optional()?;
        Ok(value.unwrap_or(false))
    }

    fn set(&self, key: &str, value: bool) -> Result<(), LockerError> {
        {
            let db = safe_lock(&self.db, "Preference database");
            db.connection().execute(
                "INSERT INTO app_lock_prefs (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, i64::from(value)],
            )?;
        }

        debug!("Preference {key} set to {value}");
        self.listeners.notify(key);
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, bool>, LockerError> {
        let db = safe_lock(&self.db, "Preference database");
        let mut stmt = db.connection().prepare("SELECT key, value FROM app_lock_prefs")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
        })?;

        let mut all = HashMap::new();
        for row in rows {
            match row {
                Ok((key, value)) => {
                    all.insert(key, value);
                }
                Err(e) => warn!("Skipping unreadable preference row: {e}"),
            }
        }
        Ok(all)
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}
