use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_HOST_APP_ID, DEFAULT_LOOKBACK_MS, DEFAULT_POLL_INTERVAL_MS,
    PREFS_DB_FILE_NAME,
};
use crate::error::LockerError;
use crate::models::AppId;
use crate::validation::{validate_app_id, validate_lookback_ms, validate_poll_interval_ms};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which foreground detector drives the lock gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherStrategy {
    /// Driven by window-state-change callbacks from the platform
    #[default]
    Accessibility,
    /// Periodic query of recent usage events
    Polling,
}

/// What a lock check answers before the locked set has been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailPolicy {
    /// No data means unlocked
    #[default]
    Open,
    /// No data means every app is locked
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    pub host_app_id: String,
    pub strategy: WatcherStrategy,
    pub poll_interval_ms: u64,
    pub lookback_ms: u64,
    pub fail_policy: FailPolicy,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            host_app_id: DEFAULT_HOST_APP_ID.to_string(),
            strategy: WatcherStrategy::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            lookback_ms: DEFAULT_LOOKBACK_MS,
            fail_policy: FailPolicy::default(),
        }
    }
}

impl LockerConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, LockerError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(LockerError::Io(e)),
        };

        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LockerError> {
        validate_app_id(&self.host_app_id)?;
        validate_poll_interval_ms(self.poll_interval_ms)?;
        validate_lookback_ms(self.lookback_ms, self.poll_interval_ms)?;
        Ok(())
    }

    pub fn host_app(&self) -> AppId {
        AppId::new(self.host_app_id.trim())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_millis(self.lookback_ms)
    }
}

fn project_dirs() -> Result<ProjectDirs, LockerError> {
    ProjectDirs::from("com", "applock", "AppLock")
        .ok_or_else(|| LockerError::Startup("Could not determine project directories".into()))
}

/// Default config file location.
pub fn default_config_path() -> Result<PathBuf, LockerError> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

/// Default preference database location, creating the data directory if needed.
pub fn default_prefs_path() -> Result<PathBuf, LockerError> {
    let proj_dirs = project_dirs()?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(PREFS_DB_FILE_NAME))
}
