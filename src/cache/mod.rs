use crate::config::FailPolicy;
use crate::error::{is_store_unreachable, LockerError};
use crate::models::AppId;
use crate::store::{PreferenceStore, SubscriptionId};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory set of locked app identifiers mirroring the preference store.
///
/// Readers (the lock gate) only ever take the read side of the lock; the
/// full reload and the per-key change callback are the only writers.
///
/// Change notifications may arrive while a reload is scanning the store. Keys
/// touched in that window are re-read once the new set is installed.
pub struct LockedSetCache {
    store: Arc<dyn PreferenceStore>,
    locked: RwLock<HashSet<AppId>>,
    loaded: AtomicBool,
    policy: FailPolicy,
    subscription: Mutex<Option<SubscriptionId>>,
    reload_guard: Mutex<()>,
    /// `Some` while a reload is in progress
    changed_during_reload: Mutex<Option<HashSet<String>>>,
}

impl LockedSetCache {
    pub fn new(store: Arc<dyn PreferenceStore>, policy: FailPolicy) -> Self {
        Self {
            store,
            locked: RwLock::new(HashSet::new()),
            loaded: AtomicBool::new(false),
            policy,
            subscription: Mutex::new(None),
            reload_guard: Mutex::new(()),
            changed_during_reload: Mutex::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<AppId>> {
        match self.locked.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("LockedSetCache: set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<AppId>> {
        match self.locked.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("LockedSetCache: set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Replace the set with every key the store holds as `true`.
    ///
    /// If the store cannot be read the set is left empty and the cache stays
    /// unloaded; [`should_lock`](Self::should_lock) then answers according to
    /// the configured [`FailPolicy`].
    pub fn reload(&self) -> Result<usize, LockerError> {
        let _reloading = crate::safe_lock(&self.reload_guard, "Cache reload");
        *crate::safe_lock(&self.changed_during_reload, "Cache reload changes") = Some(HashSet::new());

        // The store is scanned without holding the set lock so that change
        // callbacks fired meanwhile can still run
        let scanned = self.store.get_all();
        let changed = crate::safe_lock(&self.changed_during_reload, "Cache reload changes")
            .take()
            .unwrap_or_default();

        let all = match scanned {
            Ok(all) => all,
            Err(e) => {
                self.write().clear();
                self.loaded.store(false, Ordering::SeqCst);
                match &e {
                    LockerError::StoreUnavailable(inner) if is_store_unreachable(inner) => {
                        warn!("Preference store unreachable, locked set is empty: {e}");
                    }
                    _ => warn!("Failed to read preference store, locked set is empty: {e}"),
                }
                return Err(e);
            }
        };

        {
            let mut locked = self.write();
            *locked = all
                .into_iter()
                .filter(|(_, is_locked)| *is_locked)
                .map(|(key, _)| AppId::new(key))
                .collect();
            self.loaded.store(true, Ordering::SeqCst);
        }

        for key in changed {
            self.refresh_key(&key);
        }

        let count = self.len();
        info!("Locked set reloaded: {count} app(s) locked");
        Ok(count)
    }

    /// Insert or remove a single identifier.
    pub fn apply(&self, app: &str, is_locked: bool) {
        Self::apply_to(&mut self.write(), app, is_locked);
    }

    fn apply_to(locked: &mut HashSet<AppId>, app: &str, is_locked: bool) {
        if is_locked {
            locked.insert(AppId::new(app));
        } else {
            locked.remove(app);
        }
        debug!("Locked set updated: {app} -> {is_locked}");
    }

    /// Re-read one key from the store and apply it. A failed read leaves the
    /// entry untouched.
    ///
    /// The read happens under the set's write lock, so concurrent refreshes of
    /// the same key apply in the order they read the store.
    pub fn refresh_key(&self, app: &str) {
        if let Some(changed) =
            crate::safe_lock(&self.changed_during_reload, "Cache reload changes").as_mut()
        {
            changed.insert(app.to_string());
        }

        let mut locked = self.write();
        match self.store.get(app) {
            Ok(is_locked) => Self::apply_to(&mut locked, app, is_locked),
            Err(e) => warn!("Failed to re-read preference for {app}: {e}"),
        }
    }

    pub fn contains(&self, app: &str) -> bool {
        self.read().contains(app)
    }

    /// Lock decision for `app`. Differs from [`contains`](Self::contains) only
    /// while unloaded under [`FailPolicy::Closed`].
    pub fn should_lock(&self, app: &str) -> bool {
        if !self.is_loaded() && self.policy == FailPolicy::Closed {
            return true;
        }
        self.contains(app)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> FailPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sorted copy of the current set.
    pub fn snapshot(&self) -> Vec<AppId> {
        let mut apps: Vec<AppId> = self.read().iter().cloned().collect();
        apps.sort();
        apps
    }

    /// Register for store change notifications. Calling twice is a no-op.
    pub fn attach(self: &Arc<Self>) {
        let mut subscription = crate::safe_lock(&self.subscription, "Cache subscription");
        if subscription.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let id = self.store.subscribe(Arc::new(move |key: &str| {
            if let Some(cache) = weak.upgrade() {
                cache.refresh_key(key);
            }
        }));
        *subscription = Some(id);
    }

    /// Stop receiving store change notifications.
    pub fn detach(&self) {
        if let Some(id) = crate::safe_lock(&self.subscription, "Cache subscription").take() {
            self.store.unsubscribe(id);
        }
    }

    pub fn is_attached(&self) -> bool {
        crate::safe_lock(&self.subscription, "Cache subscription").is_some()
    }
}

impl Drop for LockedSetCache {
    fn drop(&mut self) {
        self.detach();
    }
}
