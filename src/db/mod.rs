pub mod schema;
pub mod migrations;

use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

/// How long a write waits for another connection (e.g. the settings screen)
/// to release the preference file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle on the preference database file.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
