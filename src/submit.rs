//! Turn job parameters into submitted scheduler jobs
//!
//! A submission goes through these steps, any failure aborting it:
//! 1. create the working directory `<job root>/<job controller id>`
//! 2. compose the pipeline arguments, staging supporting files
//! 3. write the complete ini
//! 4. generate the stage scripts and the SLURM master script or HTCondor DAG
//! 5. for SLURM jobs on real data, run data generation locally
//! 6. submit to the scheduler and record the job in the job store

/// Compose and write the pipeline ini
pub mod ini;
/// Local data generation for real-data SLURM jobs
pub mod generation;
/// Supporting file download
pub mod supporting;

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::db::{JobRecord, JobStore};
use crate::pipe;
use crate::pipe::cwd::{absolute, in_directory};
use crate::pipe::input::{MainInput, SUBMIT_DIRECTORY};
use crate::request::job::{JobParameters, SubmitDetails};
use crate::scheduler::Scheduler;
use crate::settings::{SchedulerKind, Settings};
use crate::submit::generation::{excise_generation, run_locally, strip_dependencies};
use crate::submit::ini::{prepare_ini_data, write_ini_file};
use crate::submit::supporting::FileFetcher;
use crate::Result;

pub struct SubmissionPipeline<'a> {
    pub settings: &'a Settings,
    pub scheduler: &'a dyn Scheduler,
    pub fetcher: &'a dyn FileFetcher,
}

impl SubmissionPipeline<'_> {
    /// Submit a job, returning its job store id
    ///
    /// `Ok(None)` means the scheduler refused the submission; nothing is recorded in the job
    /// store in that case. The working directory is left behind on any failure.
    pub fn submit(
        &self,
        store: &mut JobStore,
        details: &SubmitDetails,
        params: &JobParameters,
    ) -> Result<Option<i64>> {
        info!("Submitting job {} ({})", details.job_id, params.name);
        let working_directory = create_working_directory(&self.settings.job_root, details)?;
        let kind = self.scheduler.kind();

        let args = prepare_ini_data(params, &working_directory, self.settings, kind, self.fetcher)?;
        let input = write_ini_file(&args, &working_directory)?;
        let script = write_submission_scripts(&input, &working_directory)?;

        if kind == SchedulerKind::Slurm && !input.is_simulated() {
            run_data_generation(&script, &working_directory)?;
        }

        let Some(submit_id) = self.scheduler.submit(&script, &working_directory) else {
            warn!("Job {} was not submitted", details.job_id);
            return Ok(None);
        };

        let job_id = store.next_job_id()?;
        store.upsert(&JobRecord {
            job_id,
            submit_id: Some(submit_id),
            working_directory: working_directory.to_string_lossy().into_owned(),
            submit_directory: SUBMIT_DIRECTORY.to_string(),
        })?;
        info!("Job {} submitted as {job_id} (scheduler id {submit_id})", details.job_id);
        Ok(Some(job_id))
    }
}

/// Working directory of a job: `<job root>/<job controller id>`
pub fn working_directory(job_root: &Path, details: &SubmitDetails) -> PathBuf {
    job_root.join(details.job_id.to_string())
}

/// Create the working directory, returning it as an absolute path
///
/// A relative job root is resolved against the process working directory. The ini `outdir`,
/// generated scripts and job record all use the returned path.
pub fn create_working_directory(job_root: &Path, details: &SubmitDetails) -> Result<PathBuf> {
    let path = absolute(&working_directory(job_root, details))?;
    info!("Creating working directory {}", path.display());
    fs::create_dir_all(&path)?;
    Ok(path)
}

/// Generate every script for the job, returning the one to submit
pub fn write_submission_scripts(input: &MainInput, working_directory: &Path) -> Result<PathBuf> {
    in_directory(working_directory, || pipe::generate(input))
}

/// Take the generation stage out of the master script, run it here, then drop the dependencies
/// the remaining stages had on it
pub fn run_data_generation(master_script: &Path, working_directory: &Path) -> Result<()> {
    let stage = excise_generation(master_script)?;
    run_locally(&stage, working_directory)?;
    strip_dependencies(master_script, &stage)
}
