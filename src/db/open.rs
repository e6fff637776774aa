use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use rusqlite::Connection;

use crate::Result;

/// How long an operation waits for another process to release the store lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn open_db(path: &Path) -> Result<Connection> {
    if !path.exists() {
        info!("Creating new job store {}", path.display());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));
    conn.execute_batch(SCHEMA)?;

    Ok(conn)
}
