//! Scheduler backends
//!
//! The orchestrator is handed one [`Scheduler`] and never branches on the configured backend
//! itself, except where the backend's [`SchedulerKind`] changes what gets generated.

use std::path::Path;
use std::process::Command;

use crate::db::JobRecord;
use crate::settings::{SchedulerKind, Settings};
use crate::status::JobStatus;
use crate::{BundleError, Result};

pub mod condor;
pub mod slurm;

pub use condor::CondorScheduler;
pub use slurm::SlurmScheduler;

/// A scheduler's view of one of its jobs, mapped to the canonical status
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub status: JobStatus,
    pub info: String,
}

impl SchedulerStatus {
    pub fn new(status: JobStatus, info: impl Into<String>) -> Self {
        SchedulerStatus { status, info: info.into() }
    }
}

pub trait Scheduler {
    fn kind(&self) -> SchedulerKind;

    /// Submit a script (SLURM) or DAG (HTCondor) from `working_directory`
    ///
    /// Returns the scheduler's id for the submission, or `None` if it could not be submitted.
    fn submit(&self, script: &Path, working_directory: &Path) -> Option<i64>;

    /// Current state of a scheduler job, or `None` if the scheduler can't tell yet
    fn status(&self, id: i64, job: &JobRecord) -> Option<SchedulerStatus>;

    fn cancel(&self, id: i64, job: &JobRecord) -> Result<()>;
}

/// Build the scheduler backend configured in `settings`
pub fn from_settings(settings: &Settings) -> Box<dyn Scheduler> {
    match settings.scheduler {
        SchedulerKind::Slurm => match &settings.slurm_bin_dir {
            Some(dir) => Box::new(SlurmScheduler::with_bin_dir(dir)),
            None => Box::new(SlurmScheduler::new()),
        },
        SchedulerKind::Condor => Box::new(CondorScheduler::new()),
    }
}

/// Run a scheduler command to completion, returning stdout. A nonzero exit is an error.
fn run(cmd: &mut Command) -> Result<String> {
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(BundleError::SchedulerCommand {
            command: cmd.get_program().to_string_lossy().into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
