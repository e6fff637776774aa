use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::pipe::dag::Stage;
use crate::pipe::input::MainInput;
use crate::pipe::path_str;
use crate::Result;

/// File the master script appends `<stage> <slurm id>` lines to, in the submit directory
pub const SLURM_IDS: &str = "slurm_ids";

/// Rendering context for the master script
#[derive(Serialize)]
struct MasterContext {
    label: String,
    output: String,
    error: String,
    time_now: String,
    stages: Vec<MasterStage>,
}

/// One `sbatch` line of the master script
#[derive(Serialize)]
struct MasterStage {
    name: String,
    /// bash array holding the `sbatch --parsable` output
    jid: String,
    /// expansion of the stage's job id
    jid_ref: String,
    dependency: String,
    output: String,
    error: String,
    script: String,
    ids_file: String,
}

/// Name of the bash array the master script stores a stage's job id in
pub fn jid_var(index: usize) -> String {
    format!("jid{index}")
}

/// Write the master script, which submits every stage with `afterok` dependencies on its parent
///
/// The master script is itself submitted as a SLURM job, and the job ids of the stages it
/// submits are recorded in [`SLURM_IDS`].
pub fn write_master_script(input: &MainInput, stages: &[Stage]) -> Result<PathBuf> {
    let submit_dir = input.submit_directory();
    let ids_file = path_str(&submit_dir.join(SLURM_IDS));

    let stages = stages
        .iter()
        .enumerate()
        .map(|(index, stage)| MasterStage {
            name: stage.name.clone(),
            jid: jid_var(index),
            jid_ref: format!("${{{}[-1]}}", jid_var(index)),
            dependency: match stage.parent {
                Some(parent) => format!("--dependency=afterok:${{{}[-1]}} ", jid_var(parent)),
                None => String::new(),
            },
            output: path_str(&stage.output),
            error: path_str(&stage.error),
            script: path_str(&stage.script),
            ids_file: ids_file.clone(),
        })
        .collect();

    let context = MasterContext {
        label: input.label.clone(),
        output: path_str(&submit_dir.join(format!("{}_master_slurm.out", input.label))),
        error: path_str(&submit_dir.join(format!("{}_master_slurm.err", input.label))),
        time_now: Utc::now().to_string(),
        stages,
    };

    let path = submit_dir.join(format!("slurm_{}_master.sh", input.label));
    info!("Writing SLURM master script {}", path.display());
    fs::write(&path, render_master(&context)?)?;
    Ok(path)
}

/// Stages recorded by the master script so far, in submission order. A stage `sbatch` refused
/// is recorded without an id.
///
/// The file doesn't exist until the master script has run.
pub fn read_slurm_ids(submit_directory: &Path) -> Result<Vec<(String, Option<i64>)>> {
    let contents = match fs::read_to_string(submit_directory.join(SLURM_IDS)) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let stages = contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?.to_string();
            let id = fields.next().and_then(|id| id.parse().ok());
            Some((name, id))
        })
        .collect();
    Ok(stages)
}

fn render_master(context: &MasterContext) -> Result<String> {
    /// included master script template
    static MASTER: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/slurm_master.txt"
    ));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("master", MASTER)?;
    Ok(tt.render("master", context)?)
}
