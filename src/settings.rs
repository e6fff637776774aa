use std::fmt;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use url::Url;

/// Job controller host serving supporting file downloads
pub const DEFAULT_JOB_CONTROLLER_URL: &str = "https://gwcloud.org.au/";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum SchedulerKind {
    Slurm,
    Condor,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedulerKind::Slurm => write!(f, "slurm"),
            SchedulerKind::Condor => write!(f, "condor"),
        }
    }
}

/// Deployment configuration shared by every entry point
///
/// Each option can be set on the command line or with the matching `BUNDLE_*` environment
/// variable.
#[derive(Args, Clone, Debug)]
pub struct Settings {
    /// Root directory holding one working directory per job
    #[arg(long, env = "BUNDLE_JOB_ROOT")]
    pub job_root: PathBuf,

    /// Directory holding the job store database
    #[arg(long, env = "BUNDLE_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Batch scheduler jobs are submitted to
    #[arg(long, value_enum, env = "BUNDLE_SCHEDULER", default_value_t = SchedulerKind::Slurm)]
    pub scheduler: SchedulerKind,

    /// Script sourced by every stage to activate the bilby environment
    #[arg(long, env = "BUNDLE_SCHEDULER_ENV")]
    pub scheduler_env: Option<PathBuf>,

    /// Base URL of the job controller (supporting file downloads)
    #[arg(long, env = "BUNDLE_JOB_CONTROLLER_URL", default_value = DEFAULT_JOB_CONTROLLER_URL)]
    pub job_controller_url: Url,

    /// Directory containing sbatch, sacct and scancel (default: search PATH)
    #[arg(long, env = "BUNDLE_SLURM_BIN_DIR")]
    pub slurm_bin_dir: Option<PathBuf>,

    #[arg(long, env = "BUNDLE_CONDOR_ACCOUNTING_GROUP")]
    pub condor_accounting_group: Option<String>,

    #[arg(long, env = "BUNDLE_CONDOR_ACCOUNTING_USER")]
    pub condor_accounting_user: Option<String>,
}

impl Settings {
    pub fn new(job_root: PathBuf, cache_dir: PathBuf, scheduler: SchedulerKind) -> Self {
        Settings {
            job_root,
            cache_dir,
            scheduler,
            scheduler_env: None,
            job_controller_url: default_job_controller_url(),
            slurm_bin_dir: None,
            condor_accounting_group: None,
            condor_accounting_user: None,
        }
    }

    /// Path of the job store database
    pub fn store_path(&self) -> PathBuf {
        self.cache_dir.join("jobs.db")
    }
}

fn default_job_controller_url() -> Url {
    // SAFETY: hardcoded URL that always parses
    Url::parse(DEFAULT_JOB_CONTROLLER_URL).expect("default job controller URL is valid")
}
