use log::debug;
use rusqlite::Connection;

use crate::db::job::JobStore;
use crate::Result;

const JOB_ID_COUNTER: &str = "job_id";

impl JobStore {
    /// Issue the next job id. The counter starts at 0, so the first id is 1.
    pub fn next_job_id(&mut self) -> Result<i64> {
        let id = self.locked(increment)?;
        debug!("Issued job id {id}");
        Ok(id)
    }
}

fn increment(conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO counter (name, value) VALUES (?1, 0) ON CONFLICT (name) DO NOTHING",
        [JOB_ID_COUNTER],
    )?;
    conn.execute("UPDATE counter SET value = value + 1 WHERE name = ?1", [JOB_ID_COUNTER])?;
    let value = conn.query_row(
        "SELECT value FROM counter WHERE name = ?1",
        [JOB_ID_COUNTER],
        |row| row.get(0),
    )?;
    Ok(value)
}
