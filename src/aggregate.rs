//! Job state is tracked per stage:
//!
//! ```text
//! unsubmitted -> submit pending -> stage running* -> completed | error | cancelled
//!                                                    | wall time exceeded | out of memory
//! ```
//!
//! A job's record leaves the job store on the poll that sees it reach a terminal state, so the
//! job controller must keep the final status it is handed.

use log::{info, warn};

use crate::db::{JobRecord, JobStore};
use crate::pipe::slurm::read_slurm_ids;
use crate::request::job::StatusDetails;
use crate::scheduler::{Scheduler, SchedulerStatus};
use crate::settings::SchedulerKind;
use crate::status::{JobStatus, StageStatus, StatusResponse};
use crate::Result;

/// Reported for jobs the job store doesn't know about
pub const MISSING_JOB_INFO: &str = "Job does not exist. Perhaps it's already finished?";

const SUBMIT_STAGE: &str = "submit";
const CONDOR_STAGE: &str = "all";
const INDETERMINATE_INFO: &str = "Unable to determine job status";

pub struct StatusAggregator<'a> {
    pub store: &'a mut JobStore,
    pub scheduler: &'a dyn Scheduler,
}

/// Outcome of checking the outer submission of a job
struct SubmitStatus {
    stage: StageStatus,
    /// The submission failed; the job is finished
    fatal: bool,
}

impl StatusAggregator<'_> {
    pub fn status(&mut self, details: &StatusDetails) -> Result<StatusResponse> {
        let Some(job) = self.store.get_job(details.scheduler_id)? else {
            info!("Job {} is not in the job store", details.scheduler_id);
            return Ok(StatusResponse {
                status: vec![StageStatus::new("system", Some(JobStatus::Error), MISSING_JOB_INFO)],
                complete: true,
            });
        };

        match self.scheduler.kind() {
            SchedulerKind::Slurm => self.slurm_status(&job),
            SchedulerKind::Condor => self.condor_status(&job),
        }
    }

    fn query(&self, id: i64, job: &JobRecord) -> Option<SchedulerStatus> {
        let status = self.scheduler.status(id, job);
        if status.is_none() {
            info!("Status of scheduler job {id} (job {}) is indeterminate", job.job_id);
        }
        status
    }

    fn submit_status(&mut self, job: &JobRecord) -> Result<SubmitStatus> {
        let Some(submit_id) = job.submit_id else {
            return Ok(SubmitStatus {
                stage: StageStatus::new(SUBMIT_STAGE, Some(JobStatus::Completed), "Completed"),
                fatal: false,
            });
        };

        match self.query(submit_id, job) {
            None => Ok(SubmitStatus {
                stage: StageStatus::new(SUBMIT_STAGE, None, INDETERMINATE_INFO),
                fatal: false,
            }),
            Some(status) if status.status.is_in_flight() => Ok(SubmitStatus {
                stage: StageStatus::new(SUBMIT_STAGE, Some(status.status), status.info),
                fatal: false,
            }),
            Some(status) if status.status == JobStatus::Completed => {
                info!("Submission of job {} completed", job.job_id);
                self.store.clear_submit_id(job.job_id)?;
                Ok(SubmitStatus {
                    stage: StageStatus::new(SUBMIT_STAGE, Some(status.status), status.info),
                    fatal: false,
                })
            }
            Some(status) => {
                warn!("Submission of job {} ended with {}", job.job_id, status.status);
                self.store.delete(job)?;
                Ok(SubmitStatus {
                    stage: StageStatus::new(SUBMIT_STAGE, Some(status.status), status.info),
                    fatal: true,
                })
            }
        }
    }

    fn condor_status(&mut self, job: &JobRecord) -> Result<StatusResponse> {
        let status = job.submit_id.and_then(|id| self.query(id, job));
        let (stage, complete) = match status {
            None => (StageStatus::new(CONDOR_STAGE, None, INDETERMINATE_INFO), false),
            Some(status) if status.status.is_in_flight() => {
                (StageStatus::new(CONDOR_STAGE, Some(status.status), status.info), false)
            }
            Some(status) => {
                info!("Job {} finished with {}", job.job_id, status.status);
                self.store.delete(job)?;
                (StageStatus::new(CONDOR_STAGE, Some(status.status), status.info), true)
            }
        };
        Ok(StatusResponse { status: vec![stage], complete })
    }

    fn slurm_status(&mut self, job: &JobRecord) -> Result<StatusResponse> {
        let submit = self.submit_status(job)?;
        if submit.fatal {
            return Ok(StatusResponse { status: vec![submit.stage], complete: true });
        }

        let mut status = vec![submit.stage];
        for (name, id) in read_slurm_ids(&job.submit_path())? {
            let stage = match id {
                Some(id) => match self.query(id, job) {
                    Some(s) => StageStatus::new(&name, Some(s.status), s.info),
                    None => StageStatus::new(&name, None, INDETERMINATE_INFO),
                },
                None => {
                    warn!("Stage {name} of job {} has no SLURM id", job.job_id);
                    StageStatus::new(&name, Some(JobStatus::Error), "Stage could not be submitted")
                }
            };
            status.push(stage);
        }

        let all_completed = status.len() > 1
            && status.iter().all(|stage| stage.status == Some(JobStatus::Completed));
        let any_failed = status.iter().any(|stage| stage.status.is_some_and(|s| s.is_failure()));
        let complete = all_completed || any_failed;
        if complete {
            info!("Job {} finished", job.job_id);
            self.store.delete(job)?;
        }
        Ok(StatusResponse { status, complete })
    }
}
