use log::info;

use crate::db::job::{JobRecord, JobStore};
use crate::{BundleError, Result};

impl JobStore {
    /// Insert a job, or merge it into the stored job with the same id
    ///
    /// A `submit_id` of `None` leaves any stored submit id in place; use
    /// [`JobStore::clear_submit_id`] to drop it.
    pub fn upsert(&mut self, job: &JobRecord) -> Result<()> {
        info!("Updating job {} in job store", job.job_id);
        self.locked(|conn| {
            conn.execute(
                "INSERT INTO job (job_id, submit_id, working_directory, submit_directory)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (job_id) DO UPDATE SET
                    submit_id = COALESCE(excluded.submit_id, job.submit_id),
                    working_directory = excluded.working_directory,
                    submit_directory = excluded.submit_directory",
                (job.job_id, job.submit_id, &job.working_directory, &job.submit_directory),
            )?;
            Ok(())
        })
    }

    /// Forget the outer submission id once that submission has been confirmed
    pub fn clear_submit_id(&mut self, job_id: i64) -> Result<()> {
        info!("Clearing submit id of job {job_id}");
        self.locked(|conn| {
            match conn.execute("UPDATE job SET submit_id = NULL WHERE job_id = ?1", [job_id])? {
                0 => Err(BundleError::JobNotFound(job_id)),
                _ => Ok(()),
            }
        })
    }

    /// Remove a job. The job must exist: deleting an unknown job is an error.
    pub fn delete(&mut self, job: &JobRecord) -> Result<()> {
        info!("Deleting job {} from job store", job.job_id);
        self.locked(|conn| {
            match conn.execute("DELETE FROM job WHERE job_id = ?1", [job.job_id])? {
                0 => Err(BundleError::JobNotFound(job.job_id)),
                _ => Ok(()),
            }
        })
    }
}
