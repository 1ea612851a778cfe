use crate::cache::LockedSetCache;
use crate::models::{AppId, ForegroundObservation, LockOutcome};
use crate::platform::{LockPresenter, Permissions};
use crate::safe_lock;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Per-app lock screen state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    UnlockedView,
    LockPresented { ticket: u64 },
}

/// What the gate did with a foreground transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Usage or overlay access is missing; nothing was evaluated
    PermissionMissing,
    /// The host app itself came to the foreground
    SelfApp,
    /// Same app as the previous observation
    Duplicate,
    /// New foreground app that is not locked
    Allowed,
    /// Lock screen requested
    LockPresented { ticket: u64 },
    /// Lock screen request failed; the app stays visible for this transition
    PresentationFailed,
}

#[derive(Debug)]
struct Resolution {
    ticket: u64,
    app: AppId,
    outcome: LockOutcome,
}

/// Completion handle for one lock screen request.
///
/// Dropping a ticket without resolving it counts as a cancelled unlock.
#[derive(Debug)]
pub struct LockTicket {
    id: u64,
    app: AppId,
    responder: Option<Sender<Resolution>>,
}

impl LockTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn app(&self) -> &AppId {
        &self.app
    }

    pub fn resolve(mut self, outcome: LockOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: LockOutcome) {
        if let Some(responder) = self.responder.take() {
            // The gate may already be gone; nothing left to update then
            let _ = responder.send(Resolution {
                ticket: self.id,
                app: self.app.clone(),
                outcome,
            });
        }
    }
}

impl Drop for LockTicket {
    fn drop(&mut self) {
        self.send(LockOutcome::Cancelled);
    }
}

/// Decides on every foreground transition whether to show the lock screen.
pub struct LockGate {
    host: AppId,
    cache: Arc<LockedSetCache>,
    permissions: Arc<dyn Permissions>,
    presenter: Arc<dyn LockPresenter>,
    last_seen: Mutex<Option<ForegroundObservation>>,
    presented: Mutex<HashMap<AppId, u64>>,
    next_ticket: AtomicU64,
    outcomes_tx: Mutex<Sender<Resolution>>,
    outcomes_rx: Mutex<Receiver<Resolution>>,
}

impl LockGate {
    pub fn new(
        host: AppId,
        cache: Arc<LockedSetCache>,
        permissions: Arc<dyn Permissions>,
        presenter: Arc<dyn LockPresenter>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            host,
            cache,
            permissions,
            presenter,
            last_seen: Mutex::new(None),
            presented: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            outcomes_tx: Mutex::new(tx),
            outcomes_rx: Mutex::new(rx),
        }
    }

    pub fn host(&self) -> &AppId {
        &self.host
    }

    pub fn permissions_granted(&self) -> bool {
        self.permissions.has_usage_access() && self.permissions.has_overlay_access()
    }

    pub fn on_foreground_transition(&self, observation: ForegroundObservation) -> GateAction {
        if !self.permissions_granted() {
            debug!("Skipping {}: permissions missing", observation.app);
            return GateAction::PermissionMissing;
        }

        self.process_outcomes();

        if observation.app == self.host {
            return GateAction::SelfApp;
        }

        {
            let mut last_seen = safe_lock(&self.last_seen, "Last foreground observation");
            if last_seen.as_ref().is_some_and(|prev| prev.app == observation.app) {
                return GateAction::Duplicate;
            }
            *last_seen = Some(observation.clone());
        }

        if !self.cache.is_loaded() {
            // Best effort; the cache's fail policy decides if this keeps failing
            let _ = self.cache.reload();
        }

        if !self.cache.should_lock(observation.app.as_str()) {
            debug!("Foreground: {} (not locked)", observation.app);
            return GateAction::Allowed;
        }

        self.present(observation.app)
    }

    fn present(&self, app: AppId) -> GateAction {
        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let ticket = LockTicket {
            id,
            app: app.clone(),
            responder: Some(safe_lock(&self.outcomes_tx, "Lock outcome channel").clone()),
        };

        // Register before presenting so an immediate resolution is not lost
        safe_lock(&self.presented, "Presented locks").insert(app.clone(), id);

        match self.presenter.present(ticket) {
            Ok(()) => {
                info!("Lock screen presented for {app} (ticket {id})");
                GateAction::LockPresented { ticket: id }
            }
            Err(e) => {
                let mut presented = safe_lock(&self.presented, "Presented locks");
                if presented.get(&app) == Some(&id) {
                    presented.remove(&app);
                }
                warn!("Failed to present lock screen for {app}: {e}");
                GateAction::PresentationFailed
            }
        }
    }

    /// Apply every lock screen outcome reported so far. Returns how many were
    /// applied; resolutions for superseded or failed requests are ignored.
    pub fn process_outcomes(&self) -> usize {
        let pending: Vec<Resolution> = {
            let rx = safe_lock(&self.outcomes_rx, "Lock outcome channel");
            rx.try_iter().collect()
        };

        let mut applied = 0;
        for resolution in pending {
            let current = {
                let mut presented = safe_lock(&self.presented, "Presented locks");
                if presented.get(&resolution.app) == Some(&resolution.ticket) {
                    presented.remove(&resolution.app);
                    true
                } else {
                    false
                }
            };

            if !current {
                debug!("Ignoring stale outcome for ticket {}", resolution.ticket);
                continue;
            }

            applied += 1;
            match resolution.outcome {
                LockOutcome::Authenticated => {
                    info!("{} unlocked", resolution.app);
                }
                LockOutcome::Cancelled => {
                    info!("Unlock of {} cancelled, returning home", resolution.app);
                    if let Err(e) = self.presenter.show_home() {
                        warn!("Failed to return home after cancelled unlock: {e}");
                    }
                }
            }
        }
        applied
    }

    pub fn lock_state(&self, app: &AppId) -> LockState {
        match safe_lock(&self.presented, "Presented locks").get(app) {
            Some(&ticket) => LockState::LockPresented { ticket },
            None => LockState::UnlockedView,
        }
    }

    /// Apps currently behind a lock screen, sorted.
    pub fn presented_apps(&self) -> Vec<AppId> {
        let mut apps: Vec<AppId> = safe_lock(&self.presented, "Presented locks")
            .keys()
            .cloned()
            .collect();
        apps.sort();
        apps
    }

    pub fn last_observation(&self) -> Option<ForegroundObservation> {
        safe_lock(&self.last_seen, "Last foreground observation").clone()
    }
}
