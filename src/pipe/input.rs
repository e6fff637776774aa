use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::pipe::args::PipelineArgs;
use crate::settings::SchedulerKind;
use crate::{BundleError, Result};

/// Submit directory, relative to the output directory
pub const SUBMIT_DIRECTORY: &str = "submit";

const DEFAULT_LABEL: &str = "label";
const DEFAULT_PERIODIC_RESTART_TIME: u64 = 28800;

/// Everything the script generator needs, derived from the pipeline arguments
#[derive(Clone, Debug)]
pub struct MainInput {
    pub args: PipelineArgs,
    pub label: String,
    /// Absolute output directory
    pub outdir: PathBuf,
    pub complete_ini_file: PathBuf,
    pub detectors: Vec<String>,
    pub scheduler: SchedulerKind,
    pub scheduler_env: Option<PathBuf>,
    pub gaussian_noise: bool,
    pub zero_noise: bool,
    pub periodic_restart_time: u64,
    pub accounting: Option<String>,
    pub accounting_user: Option<String>,
    pub request_memory: String,
    pub request_memory_generation: String,
    pub request_cpus: u32,
    pub analysis_time: String,
}

impl MainInput {
    pub fn from_ini_file(path: &Path) -> Result<MainInput> {
        info!("Reading pipeline configuration {}", path.display());
        let ini = fs::read_to_string(path)?;
        MainInput::new(PipelineArgs::parse(&ini)?)
    }

    /// Resolve the arguments. A relative `outdir` is taken relative to the current directory.
    pub fn new(args: PipelineArgs) -> Result<MainInput> {
        let label = args.get("label").unwrap_or(DEFAULT_LABEL).to_string();

        let detectors = args.get_list("detectors");
        if detectors.is_empty() {
            return Err(BundleError::Ini("no detectors configured".to_string()));
        }

        let outdir = PathBuf::from(args.get("outdir").unwrap_or("outdir"));
        let outdir = match outdir.is_absolute() {
            true => outdir,
            false => env::current_dir()?.join(outdir),
        };
        let complete_ini_file = outdir.join(format!("{label}_config_complete.ini"));

        let scheduler = match args.get("scheduler").map(str::to_ascii_lowercase).as_deref() {
            Some("slurm") => SchedulerKind::Slurm,
            Some("condor") | None => SchedulerKind::Condor,
            Some(other) => return Err(BundleError::Ini(format!("unknown scheduler {other}"))),
        };

        let periodic_restart_time = match args.get("periodic_restart_time") {
            Some(value) => value.parse().map_err(|_| {
                BundleError::Ini(format!("periodic_restart_time is not a number: {value}"))
            })?,
            None => DEFAULT_PERIODIC_RESTART_TIME,
        };
        let request_cpus = match args.get("request_cpus") {
            Some(value) => value
                .parse()
                .map_err(|_| BundleError::Ini(format!("request_cpus is not a number: {value}")))?,
            None => 1,
        };

        Ok(MainInput {
            label,
            outdir,
            complete_ini_file,
            detectors,
            scheduler,
            scheduler_env: args.get("scheduler_env").map(PathBuf::from),
            gaussian_noise: args.get_bool("gaussian_noise").unwrap_or(false),
            zero_noise: args.get_bool("zero_noise").unwrap_or(false),
            periodic_restart_time,
            accounting: args.get("accounting").map(str::to_string),
            accounting_user: args.get("accounting_user").map(str::to_string),
            request_memory: args.get("request_memory").unwrap_or("4").to_string(),
            request_memory_generation: args
                .get("request_memory_generation")
                .unwrap_or("8")
                .to_string(),
            request_cpus,
            analysis_time: args.get("scheduler_analysis_time").unwrap_or("7-00:00:00").to_string(),
            args,
        })
    }

    /// Pure simulated Gaussian noise needs no detector data, so its generation stage can run
    /// anywhere. Zero-noise jobs may still inject into real data and are not included.
    pub fn is_simulated(&self) -> bool {
        self.gaussian_noise
    }

    /// Detectors joined into one name, as used in stage names ("H1L1")
    pub fn detector_name(&self) -> String {
        self.detectors.concat()
    }

    pub fn submit_directory(&self) -> PathBuf {
        self.outdir.join(SUBMIT_DIRECTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(ini: &str) -> Result<MainInput> {
        MainInput::new(PipelineArgs::parse(ini).unwrap())
    }

    #[test]
    fn derives_complete_ini_name_from_label() {
        let input = input("label = GW150914\noutdir = /jobs/1\ndetectors = [H1, L1]\n").unwrap();
        assert_eq!(input.complete_ini_file, PathBuf::from("/jobs/1/GW150914_config_complete.ini"));
        assert_eq!(input.submit_directory(), PathBuf::from("/jobs/1/submit"));
        assert_eq!(input.detector_name(), "H1L1");
        assert_eq!(input.scheduler, SchedulerKind::Condor);
        assert_eq!(input.periodic_restart_time, DEFAULT_PERIODIC_RESTART_TIME);
        assert!(!input.is_simulated());
    }

    #[test]
    fn reads_scheduler_options() {
        let input = input(
            "outdir = /jobs/2\ndetectors = H1\nscheduler = slurm\nzero-noise = True\n\
             periodic-restart-time = 2147483647\n",
        )
        .unwrap();
        assert_eq!(input.label, "label");
        assert_eq!(input.scheduler, SchedulerKind::Slurm);
        assert_eq!(input.periodic_restart_time, 2147483647);
        assert!(input.zero_noise);
        assert!(!input.is_simulated());
    }

    #[test]
    fn only_gaussian_noise_is_simulated() {
        let input = input("outdir = /jobs/4
detectors = H1
gaussian-noise = True
").unwrap();
        assert!(input.is_simulated());
    }

    #[test]
    fn requires_detectors() {
        assert!(input("outdir = /jobs/3\n").is_err());
        assert!(input("outdir = /jobs/3\ndetectors = H1\nscheduler = pbs\n").is_err());
    }
}
