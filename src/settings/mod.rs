//! Lock settings: which apps can be locked and toggling their lock flag.

use crate::error::LockerError;
use crate::models::{AppEntry, AppId};
use crate::platform::AppCatalog;
use crate::store::PreferenceStore;
use crate::validation::validate_app_id;
use log::info;

/// Launchable installed apps other than the host, with their lock flag,
/// sorted by label (case-insensitive, identifier as tie-breaker).
pub fn lockable_apps(
    catalog: &dyn AppCatalog,
    store: &dyn PreferenceStore,
    host: &AppId,
) -> Result<Vec<AppEntry>, LockerError> {
    let locked = store.get_all()?;

    let mut entries: Vec<AppEntry> = catalog
        .installed_apps()?
        .into_iter()
        .filter(|app| app.launchable && &app.id != host)
        .map(|app| AppEntry {
            locked: locked.get(app.id.as_str()).copied().unwrap_or(false),
            id: app.id,
            label: app.label,
        })
        .collect();

    entries.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(entries)
}

/// Persist the lock flag for one app. Subscribed caches pick the change up
/// through the store's change notification.
pub fn set_locked(store: &dyn PreferenceStore, app_id: &str, locked: bool) -> Result<AppId, LockerError> {
    let app_id = validate_app_id(app_id)?;
    store.set(app_id, locked)?;
    info!("{app_id} {}", if locked { "locked" } else { "unlocked" });
    Ok(AppId::new(app_id))
}

/// Identifiers currently stored as locked, sorted.
pub fn locked_apps(store: &dyn PreferenceStore) -> Result<Vec<AppId>, LockerError> {
    let mut apps: Vec<AppId> = store
        .get_all()?
        .into_iter()
        .filter(|(_, locked)| *locked)
        .map(|(key, _)| AppId::new(key))
        .collect();
    apps.sort();
    Ok(apps)
}
