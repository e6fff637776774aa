use rusqlite::OptionalExtension;

use crate::db::job::{JobRecord, JobStore};
use crate::Result;

impl JobStore {
    pub fn get_job(&mut self, job_id: i64) -> Result<Option<JobRecord>> {
        self.locked(|conn| {
            let job = conn
                .query_row(
                    "SELECT job_id, submit_id, working_directory, submit_directory
                     FROM job WHERE job_id = ?1",
                    [job_id],
                    JobRecord::from_row,
                )
                .optional()?;
            Ok(job)
        })
    }

    /// Every in-flight job, in job id order
    pub fn jobs(&mut self) -> Result<Vec<JobRecord>> {
        self.locked(|conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, submit_id, working_directory, submit_directory
                 FROM job ORDER BY job_id",
            )?;
            let rows = stmt.query_map([], JobRecord::from_row)?;
            let jobs = rows.collect::<rusqlite::Result<Vec<JobRecord>>>()?;
            Ok(jobs)
        })
    }
}
