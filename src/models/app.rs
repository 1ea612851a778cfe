use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque, stable name of an installed application (its package identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for AppId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// The most recently detected foreground app. Overwritten every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundObservation {
    pub app: AppId,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl ForegroundObservation {
    pub fn new(app: AppId, timestamp_ms: i64) -> Self {
        Self { app, timestamp_ms }
    }

    pub fn now(app: AppId) -> Self {
        Self::new(app, current_timestamp_ms())
    }
}

/// How a lock screen was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOutcome {
    Authenticated,
    Cancelled,
}

/// An installed app as reported by the platform catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub id: AppId,
    pub label: String,
    /// Whether the app has a launcher entry
    pub launchable: bool,
}

/// A row of the lock settings list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEntry {
    pub id: AppId,
    pub label: String,
    pub locked: bool,
}

pub(crate) fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_app_id_display_and_compare() {
        let id = AppId::new("com.example.mail");
        assert_eq!(id.to_string(), "com.example.mail");
        assert_eq!(&id, "com.example.mail");
        assert_eq!(id, AppId::from("com.example.mail"));
    }

    #[test]
    fn test_app_id_set_lookup_by_str() {
        let mut set = HashSet::new();
        set.insert(AppId::new("com.a"));
        assert!(set.contains("com.a"));
        assert!(!set.contains("com.b"));
    }

    #[test]
    fn test_app_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&AppId::new("com.a")).unwrap();
        assert_eq!(json, "\"com.a\"");
    }

    #[test]
    fn test_observation_now_has_timestamp() {
        let obs = ForegroundObservation::now(AppId::new("com.a"));
        assert!(obs.timestamp_ms > 0);
    }

    #[test]
    fn test_lock_outcome_wire_names() {
        assert_eq!(serde_json::to_string(&LockOutcome::Authenticated).unwrap(), "\"authenticated\"");
        let outcome: LockOutcome = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(outcome, LockOutcome::Cancelled);
    }
}
