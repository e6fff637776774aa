//! Pipeline configuration and script generation
//!
//! The pipeline is configured with a bilby_pipe style ini file. The generator only knows the
//! process working directory as its base directory (a relative `outdir` is resolved against
//! it), so every call into it from a request handler goes through [`cwd::in_directory`].

/// Ini argument object
pub mod args;
/// Serialise access to the process working directory
pub mod cwd;
/// The job's stage graph
pub mod dag;
/// Complete pipeline input derived from the ini arguments
pub mod input;
/// HTCondor DAG and node submit files
pub mod condor;
/// SLURM master script chain
pub mod slurm;

pub use args::PipelineArgs;
pub use input::MainInput;

use std::path::{Path, PathBuf};

use crate::settings::SchedulerKind;
use crate::Result;

/// Write every stage script plus the scheduler's top level file and return its path
pub fn generate(input: &MainInput) -> Result<PathBuf> {
    let stages = dag::stages(input);
    dag::write_stage_scripts(input, &stages)?;
    match input.scheduler {
        SchedulerKind::Slurm => slurm::write_master_script(input, &stages),
        SchedulerKind::Condor => condor::write_dag(input, &stages),
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
