//! Job records and the job id counter
//!
//! A JobRecord exists from a successful scheduler submission until the status poll that sees
//! the job finish. Records are keyed by the store-issued `job_id`, which is what the job
//! controller knows as the scheduler id.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::open::open_db;
use crate::Result;

pub mod counter;
pub mod load;
pub mod update;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: i64,
    /// Scheduler id of the outer submission, dropped once that submission is confirmed
    pub submit_id: Option<i64>,
    pub working_directory: String,
    pub submit_directory: String,
}

impl JobRecord {
    /// Directory holding the generated scripts, `slurm_ids` and scheduler logs
    pub fn submit_path(&self) -> PathBuf {
        Path::new(&self.working_directory).join(&self.submit_directory)
    }

    fn from_row(row: &Row) -> rusqlite::Result<JobRecord> {
        Ok(JobRecord {
            job_id: row.get(0)?,
            submit_id: row.get(1)?,
            working_directory: row.get(2)?,
            submit_directory: row.get(3)?,
        })
    }
}

/// Disk-backed store of in-flight jobs, safe to share between processes
pub struct JobStore {
    conn: Connection,
}

impl JobStore {
    pub fn open(path: &Path) -> Result<JobStore> {
        Ok(JobStore { conn: open_db(path)? })
    }

    /// Run `f` inside an exclusive transaction, committing only if it succeeds
    fn locked<T>(&mut self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
