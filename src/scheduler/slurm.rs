//! SLURM backend, driven through the `sbatch`, `sacct` and `scancel` commands

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{info, warn};

use crate::db::JobRecord;
use crate::scheduler::{run, Scheduler, SchedulerStatus};
use crate::settings::SchedulerKind;
use crate::status::JobStatus;
use crate::{BundleError, Result};

pub struct SlurmScheduler {
    sbatch: PathBuf,
    sacct: PathBuf,
    scancel: PathBuf,
}

impl SlurmScheduler {
    /// Use the SLURM commands found on `PATH`
    pub fn new() -> Self {
        SlurmScheduler {
            sbatch: PathBuf::from("sbatch"),
            sacct: PathBuf::from("sacct"),
            scancel: PathBuf::from("scancel"),
        }
    }

    /// Use the SLURM commands installed in `dir`
    pub fn with_bin_dir(dir: &Path) -> Self {
        SlurmScheduler {
            sbatch: dir.join("sbatch"),
            sacct: dir.join("sacct"),
            scancel: dir.join("scancel"),
        }
    }

    fn run_sbatch(&self, script: &Path, working_directory: &Path) -> Result<i64> {
        let mut sbatch = Command::new(&self.sbatch);
        let cmd = sbatch.arg(script).current_dir(working_directory);
        info!("Running sbatch process");
        info!("{:?}", &cmd);
        let stdout = run(cmd)?;
        parse_job_id(&stdout).ok_or_else(|| BundleError::SchedulerCommand {
            command: "sbatch".to_string(),
            stderr: format!("no job id in output {stdout:?}"),
        })
    }
}

impl Default for SlurmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for SlurmScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Slurm
    }

    fn submit(&self, script: &Path, working_directory: &Path) -> Option<i64> {
        match self.run_sbatch(script, working_directory) {
            Ok(id) => {
                info!("SLURM job id: {id}");
                Some(id)
            }
            Err(err) => {
                warn!("Unable to submit {}: {err}", script.display());
                None
            }
        }
    }

    fn status(&self, id: i64, _job: &JobRecord) -> Option<SchedulerStatus> {
        let mut sacct = Command::new(&self.sacct);
        let cmd = sacct.args(["-Pn", "-j", &id.to_string(), "-o", "jobid,state%50"]);
        let stdout = match run(cmd) {
            Ok(stdout) => stdout,
            Err(err) => {
                warn!("Unable to query SLURM job {id}: {err}");
                return None;
            }
        };

        let status = find_state(&stdout, id).and_then(map_state);
        if status.is_none() {
            info!("No usable sacct state for SLURM job {id}");
        }
        status
    }

    fn cancel(&self, id: i64, _job: &JobRecord) -> Result<()> {
        info!("Cancelling SLURM job {id}");
        let mut scancel = Command::new(&self.scancel);
        run(scancel.arg(id.to_string()))?;
        Ok(())
    }
}

/// sbatch prints "Submitted batch job 11" (or just "11" with --parsable): the id is the last token
fn parse_job_id(stdout: &str) -> Option<i64> {
    stdout.split_whitespace().last()?.parse().ok()
}

/// Pick the state of the job itself out of `sacct -P` rows, ignoring step rows like `11.batch`
fn find_state(stdout: &str, id: i64) -> Option<&str> {
    let id = id.to_string();
    stdout
        .lines()
        .filter_map(|line| line.trim().split_once('|'))
        .find(|(jobid, _)| *jobid == id)
        .map(|(_, state)| state.trim())
}

/// Map a SLURM job state to the canonical status
pub fn map_state(state: &str) -> Option<SchedulerStatus> {
    let status = match state {
        "COMPLETED" => SchedulerStatus::new(JobStatus::Completed, "Completed"),
        "PENDING" | "REQUEUED" | "RESIZING" => SchedulerStatus::new(JobStatus::Queued, "Queued"),
        "RUNNING" | "SUSPENDED" => SchedulerStatus::new(JobStatus::Running, "Running"),
        "TIMEOUT" => {
            SchedulerStatus::new(JobStatus::WallTimeExceeded, "Job exceeded its wall time")
        }
        "OUT_OF_MEMORY" => SchedulerStatus::new(JobStatus::OutOfMemory, "Job ran out of memory"),
        "BOOT_FAIL" | "DEADLINE" | "FAILED" | "NODE_FAIL" | "PREEMPTED" | "REVOKED" => {
            SchedulerStatus::new(JobStatus::Error, format!("Job failed ({state})"))
        }
        // "CANCELLED by 1234"
        s if s.starts_with("CANCELLED") => {
            SchedulerStatus::new(JobStatus::Cancelled, "Job was cancelled")
        }
        _ => return None,
    };
    Some(status)
}
