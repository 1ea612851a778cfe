use crate::constants::{MAX_APP_ID_LEN, MAX_POLL_INTERVAL_MS};
use crate::error::LockerError;

/// Validate an app identifier.
/// Returns the trimmed identifier if valid.
pub fn validate_app_id(app_id: &str) -> Result<&str, LockerError> {
    let app_id = app_id.trim();
    if app_id.is_empty() {
        return Err(LockerError::InvalidInput {
            field: "app_id",
            reason: "cannot be empty".into(),
        });
    }
    if app_id.len() > MAX_APP_ID_LEN {
        return Err(LockerError::InvalidInput {
            field: "app_id",
            reason: format!("cannot exceed {MAX_APP_ID_LEN} characters"),
        });
    }
    if app_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LockerError::InvalidInput {
            field: "app_id",
            reason: "cannot contain whitespace or control characters".into(),
        });
    }
    Ok(app_id)
}

/// Validate the polling cadence in milliseconds.
pub fn validate_poll_interval_ms(interval_ms: u64) -> Result<(), LockerError> {
    if interval_ms == 0 {
        return Err(LockerError::InvalidInput {
            field: "poll_interval_ms",
            reason: "must be positive".into(),
        });
    }
    if interval_ms > MAX_POLL_INTERVAL_MS {
        return Err(LockerError::InvalidInput {
            field: "poll_interval_ms",
            reason: format!("cannot exceed {MAX_POLL_INTERVAL_MS} ms"),
        });
    }
    Ok(())
}

/// Validate the trailing query window against the polling cadence.
///
/// A window shorter than one interval would leave gaps between ticks in which
/// transitions are never seen.
pub fn validate_lookback_ms(lookback_ms: u64, interval_ms: u64) -> Result<(), LockerError> {
    if lookback_ms < interval_ms {
        return Err(LockerError::InvalidInput {
            field: "lookback_ms",
            reason: format!("must be at least the poll interval ({interval_ms} ms)"),
        });
    }
    Ok(())
}
