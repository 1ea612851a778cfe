use crate::cache::LockedSetCache;
use crate::config::{LockerConfig, WatcherStrategy};
use crate::error::LockerError;
use crate::gate::{GateAction, LockGate};
use crate::models::AppId;
use crate::platform::{LockPresenter, Permissions, UsageEvents, WindowEvent};
use crate::store::PreferenceStore;
use crate::watcher::{
    AccessibilityWatcher, ForegroundWatcher, PollingConfig, PollingWatcher, Watcher,
};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Platform collaborators the service is wired to.
pub struct Collaborators {
    pub store: Arc<dyn PreferenceStore>,
    pub permissions: Arc<dyn Permissions>,
    pub presenter: Arc<dyn LockPresenter>,
    /// Required by the polling strategy only
    pub usage_events: Option<Arc<dyn UsageEvents>>,
}

/// Owns the locked-set cache, the lock gate and the configured watcher for
/// the lifetime of the host service.
pub struct LockService {
    config: LockerConfig,
    cache: Arc<LockedSetCache>,
    gate: Arc<LockGate>,
    watcher: ForegroundWatcher,
}

impl LockService {
    /// Load the locked set, subscribe to store changes and start detection.
    ///
    /// Any failure here stops everything that was already set up and returns
    /// the error; the service is never left half-initialised.
    pub fn start(config: LockerConfig, collaborators: Collaborators) -> Result<Self, LockerError> {
        if let Err(e) = config.validate() {
            error!("Lock service not started, invalid configuration: {e}");
            return Err(e);
        }

        let Collaborators { store, permissions, presenter, usage_events } = collaborators;

        if !permissions.has_usage_access() || !permissions.has_overlay_access() {
            warn!("Usage or overlay access missing; detection idles until both are granted");
        }

        let cache = Arc::new(LockedSetCache::new(store, config.fail_policy));
        // Subscribe first so a write racing the initial scan is still seen.
        // Store failures are not fatal here: the cache stays unloaded and the
        // gate retries on the next transition
        cache.attach();
        let _ = cache.reload();

        let gate = Arc::new(LockGate::new(
            config.host_app(),
            Arc::clone(&cache),
            Arc::clone(&permissions),
            presenter,
        ));

        let mut watcher = match config.strategy {
            WatcherStrategy::Accessibility => {
                ForegroundWatcher::Accessibility(AccessibilityWatcher::new(Arc::clone(&gate)))
            }
            WatcherStrategy::Polling => {
                let Some(source) = usage_events else {
                    cache.detach();
                    error!("Polling strategy configured without a usage event source");
                    return Err(LockerError::Startup("polling strategy requires usage events".into()));
                };
                ForegroundWatcher::Polling(PollingWatcher::new(
                    Arc::clone(&gate),
                    source,
                    permissions,
                    PollingConfig {
                        interval: config.poll_interval(),
                        lookback: config.lookback(),
                    },
                ))
            }
        };

        if let Err(e) = watcher.start() {
            cache.detach();
            error!("Lock service failed to start: {e}");
            return Err(e);
        }

        info!(
            "Lock service started ({:?} watcher, {} app(s) locked)",
            config.strategy,
            cache.len()
        );
        Ok(Self { config, cache, gate, watcher })
    }

    /// Forward a platform window event. Only meaningful for the accessibility
    /// strategy; ignored otherwise.
    pub fn on_window_event(&self, event: &WindowEvent) -> Option<GateAction> {
        match self.watcher.accessibility() {
            Some(watcher) => watcher.on_event(event),
            None => {
                debug!("Window event ignored by {:?} watcher", self.watcher.strategy());
                None
            }
        }
    }

    pub fn process_outcomes(&self) -> usize {
        self.gate.process_outcomes()
    }

    pub fn is_locked(&self, app: &AppId) -> bool {
        self.cache.contains(app.as_str())
    }

    pub fn locked_apps(&self) -> Vec<AppId> {
        self.cache.snapshot()
    }

    pub fn current_app(&self) -> Option<AppId> {
        self.gate.last_observation().map(|obs| obs.app)
    }

    pub fn presented_apps(&self) -> Vec<AppId> {
        self.gate.presented_apps()
    }

    pub fn gate(&self) -> &Arc<LockGate> {
        &self.gate
    }

    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_running()
    }

    /// Stop detection and unsubscribe from the store. Idempotent.
    pub fn stop(&mut self) {
        if self.watcher.is_running() {
            self.watcher.stop();
            info!("Lock service stopped");
        }
        self.cache.detach();
    }
}

impl Drop for LockService {
    fn drop(&mut self) {
        self.stop();
    }
}
