use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::pipe::args::PipelineArgs;
use crate::pipe::cwd::in_directory;
use crate::pipe::input::MainInput;
use crate::request::job::JobParameters;
use crate::settings::{SchedulerKind, Settings};
use crate::submit::supporting::{stage_supporting_files, FileFetcher};
use crate::{BundleError, Result};

/// SLURM jobs are never evicted, so they never need restarting
const SLURM_PERIODIC_RESTART_TIME: &str = "2147483647";
const CONDOR_PERIODIC_RESTART_TIME: &str = "28800";

/// Options every job runs with, whatever the submitted ini says
const FIXED_FLAGS: [(&str, bool); 7] = [
    ("submit", false),
    ("local", false),
    ("local_generation", false),
    ("create_plots", true),
    ("create_summary", false),
    ("catch_waveform_errors", true),
    ("transfer_files", false),
];

/// Parse the submitted ini and override everything this deployment decides
pub fn prepare_ini_data(
    params: &JobParameters,
    working_directory: &Path,
    settings: &Settings,
    scheduler: SchedulerKind,
    fetcher: &dyn FileFetcher,
) -> Result<PipelineArgs> {
    let mut args = PipelineArgs::parse(&params.ini_string)?;

    if scheduler == SchedulerKind::Condor {
        if let Some(group) = &settings.condor_accounting_group {
            args.set("accounting", group.as_str());
        }
        if let Some(user) = &settings.condor_accounting_user {
            args.set("accounting_user", user.as_str());
        }
    }

    if args.get("label").is_none() {
        args.set("label", label_from_name(&params.name));
    }
    args.set("outdir", working_directory.to_string_lossy());
    args.set(
        "periodic_restart_time",
        match scheduler {
            SchedulerKind::Slurm => SLURM_PERIODIC_RESTART_TIME,
            SchedulerKind::Condor => CONDOR_PERIODIC_RESTART_TIME,
        },
    );
    args.set("scheduler", scheduler.to_string());
    if let Some(env) = &settings.scheduler_env {
        args.set("scheduler_env", env.to_string_lossy());
    }
    for (flag, value) in FIXED_FLAGS {
        args.set_bool(flag, value);
    }
    args.set("result_format", "json");

    let detectors = args.get_list("detectors");
    if !detectors.is_empty() {
        args.set_list("detectors", &detectors);
    }

    if !params.supporting_files.is_empty() {
        info!("Staging {} supporting files", params.supporting_files.len());
        stage_supporting_files(&params.supporting_files, &mut args, working_directory, fetcher)?;
    }

    Ok(args)
}

/// Labels end up in file names
fn label_from_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Write the complete ini into the working directory under the name the pipeline derives for it
///
/// The pipeline only reports that name after reading an ini file with the working directory as
/// the current directory, so the arguments go through a temporary file first.
pub fn write_ini_file(args: &PipelineArgs, working_directory: &Path) -> Result<MainInput> {
    let ini = args.to_ini_string();
    let mut tmp = tempfile::Builder::new().prefix("bundle_").suffix(".ini").tempfile()?;
    tmp.write_all(ini.as_bytes())?;
    tmp.flush()?;

    let input = in_directory(working_directory, || MainInput::from_ini_file(tmp.path()))?;
    let name = input
        .complete_ini_file
        .file_name()
        .ok_or_else(|| BundleError::Ini("complete ini file has no name".to_string()))?;
    let path = working_directory.join(name);
    info!("Writing complete ini {}", path.display());
    fs::write(&path, ini)?;

    Ok(input)
}
