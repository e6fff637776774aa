use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use log::info;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::pipe::input::MainInput;
use crate::pipe::path_str;
use crate::settings::SchedulerKind;
use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StageKind {
    Generation,
    Analysis,
    FinalResult,
    Plot,
}

/// One schedulable unit of a job
#[derive(Clone, Debug)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    /// Index of the stage this one waits for
    pub parent: Option<usize>,
    pub command: String,
    pub script: PathBuf,
    pub output: PathBuf,
    pub error: PathBuf,
    pub memory_gb: String,
    pub time: String,
}

impl Stage {
    fn new(
        input: &MainInput,
        name: String,
        kind: StageKind,
        parent: Option<usize>,
        command: String,
    ) -> Stage {
        let (log_dir, memory_gb, time) = match kind {
            StageKind::Generation => (
                "log_data_generation",
                input.request_memory_generation.clone(),
                "1:00:00".to_string(),
            ),
            StageKind::Analysis => (
                "log_data_analysis",
                input.request_memory.clone(),
                input.analysis_time.clone(),
            ),
            StageKind::FinalResult | StageKind::Plot => {
                ("log_results", "4".to_string(), "1:00:00".to_string())
            }
        };
        let log_dir = input.outdir.join(log_dir);
        Stage {
            script: input.submit_directory().join(format!("{name}.sh")),
            output: log_dir.join(format!("{name}.out")),
            error: log_dir.join(format!("{name}.err")),
            name,
            kind,
            parent,
            command,
            memory_gb,
            time,
        }
    }
}

/// The job's stages in submission order: generation, analysis, then final result and plot,
/// which both depend on the analysis
pub fn stages(input: &MainInput) -> Vec<Stage> {
    let ini = path_str(&input.complete_ini_file);
    let outdir = path_str(&input.outdir);
    let label = &input.label;
    let detectors = input.detector_name();
    let analysis = format!("analysis_{detectors}");
    let result_file = format!("{outdir}/result/{label}_{detectors}_result.json");
    let detector_args: Vec<String> =
        input.detectors.iter().map(|d| format!("--detectors {d}")).collect();

    vec![
        Stage::new(
            input,
            "generation".to_string(),
            StageKind::Generation,
            None,
            format!(
                "bilby_pipe_generation {ini} --label {label}_generation --idx 0 --outdir {outdir}"
            ),
        ),
        Stage::new(
            input,
            analysis.clone(),
            StageKind::Analysis,
            Some(0),
            format!(
                "bilby_pipe_analysis {ini} --outdir {outdir} {} --label {label}_{detectors} \
                 --data-dump-file {outdir}/data/{label}_generation_data_dump.pickle",
                detector_args.join(" "),
            ),
        ),
        Stage::new(
            input,
            format!("{analysis}_final_result"),
            StageKind::FinalResult,
            Some(1),
            format!(
                "bilby_result --result {result_file} --outdir {outdir}/final_result \
                 --extension json --max-samples 20000 --lightweight --save"
            ),
        ),
        Stage::new(
            input,
            format!("{analysis}_plot"),
            StageKind::Plot,
            Some(1),
            format!(
                "bilby_pipe_plot {ini} --result {result_file} --outdir {outdir}/result \
                 --corner --waveform --format png"
            ),
        ),
    ]
}

/// Rendering context for a stage script
#[derive(Serialize)]
struct StageContext {
    directives: Vec<String>,
    activate: String,
    command: String,
}

/// Write an executable bash script per stage, creating the submit and log directories
pub fn write_stage_scripts(input: &MainInput, stages: &[Stage]) -> Result<()> {
    fs::create_dir_all(input.submit_directory())?;
    for stage in stages {
        for log in [&stage.output, &stage.error] {
            if let Some(dir) = log.parent() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = render_stage_script(input, stage)?;
        info!("Writing stage script {}", stage.script.display());
        fs::write(&stage.script, content)?;
        fs::set_permissions(&stage.script, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn render_stage_script(input: &MainInput, stage: &Stage) -> Result<String> {
    /// included stage script template
    static STAGE: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/stage.txt"
    ));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("stage", STAGE)?;

    let directives = match input.scheduler {
        SchedulerKind::Slurm => vec![
            format!("--time={}", stage.time),
            format!("--mem={}G", stage.memory_gb),
            "--ntasks=1".to_string(),
            format!("--cpus-per-task={}", cpus(input, stage)),
        ],
        SchedulerKind::Condor => Vec::new(),
    };
    let activate = match &input.scheduler_env {
        Some(env) => format!("source {}", env.display()),
        None => String::new(),
    };
    let context = StageContext { directives, activate, command: stage.command.clone() };
    Ok(tt.render("stage", &context)?)
}

/// Only the sampler makes use of more than one core
pub fn cpus(input: &MainInput, stage: &Stage) -> u32 {
    match stage.kind {
        StageKind::Analysis => input.request_cpus,
        _ => 1,
    }
}
