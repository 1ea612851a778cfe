// src/constants.rs

/// Identifier the host app is known by when no configuration overrides it
pub const DEFAULT_HOST_APP_ID: &str = "com.applock";

/// Polling watcher cadence in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

/// Trailing window queried by the polling watcher on each tick
pub const DEFAULT_LOOKBACK_MS: u64 = 1000;

/// Upper bound for the polling interval (one minute)
pub const MAX_POLL_INTERVAL_MS: u64 = 60 * 1000;

/// Maximum app identifier length
pub const MAX_APP_ID_LEN: usize = 255;

/// Largest bridge frame accepted from the platform shell (1 MiB)
pub const MAX_BRIDGE_MESSAGE_SIZE: usize = 1024 * 1024;

/// File names under the project directories
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const PREFS_DB_FILE_NAME: &str = "prefs.db";
