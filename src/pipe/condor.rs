use std::fs;
use std::path::PathBuf;

use log::info;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::pipe::dag::{cpus, Stage};
use crate::pipe::input::MainInput;
use crate::pipe::path_str;
use crate::Result;

#[derive(Serialize)]
struct DagContext {
    nodes: Vec<DagNode>,
    edges: Vec<DagEdge>,
}

#[derive(Serialize)]
struct DagNode {
    name: String,
    submit_file: String,
}

#[derive(Serialize)]
struct DagEdge {
    parent: String,
    children: String,
}

/// Rendering context for a node submit file
#[derive(Serialize)]
struct NodeContext {
    executable: String,
    initial_dir: String,
    memory: String,
    disk: String,
    cpus: u32,
    output: String,
    error: String,
    periodic_restart_time: u64,
    accounting: Vec<String>,
}

/// Write a submit file per stage and the DAG tying them together, returning the DAG's path
///
/// DAGMan writes the node event log next to the DAG as `<dag>.nodes.log`.
pub fn write_dag(input: &MainInput, stages: &[Stage]) -> Result<PathBuf> {
    let submit_dir = input.submit_directory();
    let mut nodes = Vec::new();
    for stage in stages {
        let submit_file = submit_dir.join(format!("{}.submit", stage.name));
        fs::write(&submit_file, render_node(&node_context(input, stage))?)?;
        nodes.push(DagNode { name: stage.name.clone(), submit_file: path_str(&submit_file) });
    }

    let edges = stages
        .iter()
        .enumerate()
        .filter_map(|(index, parent)| {
            let children: Vec<&str> = stages
                .iter()
                .filter(|stage| stage.parent == Some(index))
                .map(|stage| stage.name.as_str())
                .collect();
            match children.is_empty() {
                true => None,
                false => Some(DagEdge {
                    parent: parent.name.clone(),
                    children: children.join(" "),
                }),
            }
        })
        .collect();

    let path = submit_dir.join(format!("dag_{}.submit", input.label));
    info!("Writing HTCondor DAG {}", path.display());
    fs::write(&path, render_dag(&DagContext { nodes, edges })?)?;
    Ok(path)
}

fn node_context(input: &MainInput, stage: &Stage) -> NodeContext {
    let mut accounting = Vec::new();
    if let Some(group) = &input.accounting {
        accounting.push(format!("accounting_group = {group}"));
    }
    if let Some(user) = &input.accounting_user {
        accounting.push(format!("accounting_group_user = {user}"));
    }
    NodeContext {
        executable: path_str(&stage.script),
        initial_dir: path_str(&input.outdir),
        memory: format!("{} GB", stage.memory_gb),
        disk: "5 GB".to_string(),
        cpus: cpus(input, stage),
        output: path_str(&stage.output),
        error: path_str(&stage.error),
        periodic_restart_time: input.periodic_restart_time,
        accounting,
    }
}

fn render_node(context: &NodeContext) -> Result<String> {
    /// included node submit file template
    static NODE: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/condor_node.txt"
    ));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("node", NODE)?;
    Ok(tt.render("node", context)?)
}

fn render_dag(context: &DagContext) -> Result<String> {
    /// included DAG template
    static DAG: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/templates/condor_dag.txt"
    ));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("dag", DAG)?;
    Ok(tt.render("dag", context)?)
}
