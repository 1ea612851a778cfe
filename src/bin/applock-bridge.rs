//! Platform bridge for the app lock core
//!
//! Runs the lock service behind a length-prefixed JSON channel on
//! stdin/stdout. The platform shell forwards window and usage events and
//! receives lock screen and home requests.

use applock_lib::{
    bridge::Bridge,
    config::{default_config_path, default_prefs_path, LockerConfig},
    LockerError, SqlitePreferenceStore,
};
use log::{error, info};
use std::io;
use std::sync::Arc;

#[cfg(target_os = "android")]
fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("AppLock"),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logging() {}

fn run() -> Result<(), LockerError> {
    let config = LockerConfig::load(&default_config_path()?)?;
    let store = SqlitePreferenceStore::open(&default_prefs_path()?)?;

    let mut bridge = Bridge::new(config, Arc::new(store), io::stdin(), io::stdout())?;
    info!("Bridge ready");

    // EOF is expected when the shell closes the channel
    match bridge.run() {
        Err(e) if e.kind() != io::ErrorKind::UnexpectedEof => Err(e.into()),
        Ok(()) | Err(_) => Ok(()),
    }
}

fn main() {
    init_logging();

    if let Err(e) = run() {
        error!("Bridge error: {e}");
        std::process::exit(1);
    }
}
