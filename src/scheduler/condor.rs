//! HTCondor backend
//!
//! DAGs are submitted through the HTCondor command line tools. Status comes from replaying the
//! DAG's node event log rather than querying the schedd, so finished jobs that have left the
//! queue still resolve to a final state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{info, warn};

use crate::db::JobRecord;
use crate::scheduler::{run, Scheduler, SchedulerStatus};
use crate::settings::SchedulerKind;
use crate::status::JobStatus;
use crate::{BundleError, Result};

use self::event::{parse_events, Event, EventKind};

pub mod event;

/// Submission attempts before giving up, retried immediately
pub const SUBMIT_ATTEMPTS: usize = 5;

/// Submits a DAG to the schedd
pub trait CondorClient {
    /// Build the DAGMan submit description for `dag` (overwriting any previous one) and submit
    /// it, returning the cluster id
    fn submit_dag(&self, dag: &Path, working_directory: &Path) -> Result<i64>;
}

/// [`CondorClient`] backed by `condor_submit_dag` and `condor_submit`
pub struct CondorCli;

impl CondorClient for CondorCli {
    fn submit_dag(&self, dag: &Path, working_directory: &Path) -> Result<i64> {
        let mut dagman = Command::new("condor_submit_dag");
        let cmd = dagman
            .args(["-force", "-no_submit"])
            .arg(dag)
            .current_dir(working_directory);
        info!("{:?}", &cmd);
        run(cmd)?;

        let mut description = dag.as_os_str().to_owned();
        description.push(".condor.sub");
        let mut submit = Command::new("condor_submit");
        let cmd = submit.arg(&description).current_dir(working_directory);
        info!("{:?}", &cmd);
        let stdout = run(cmd)?;
        parse_cluster_id(&stdout).ok_or_else(|| BundleError::SchedulerCommand {
            command: "condor_submit".to_string(),
            stderr: format!("no cluster id in output {stdout:?}"),
        })
    }
}

/// "1 job(s) submitted to cluster 1234."
fn parse_cluster_id(stdout: &str) -> Option<i64> {
    let (_, rest) = stdout.split_once("submitted to cluster")?;
    rest.trim().trim_end_matches('.').parse().ok()
}

pub struct CondorScheduler<C: CondorClient = CondorCli> {
    client: C,
}

impl CondorScheduler<CondorCli> {
    pub fn new() -> Self {
        CondorScheduler { client: CondorCli }
    }
}

impl Default for CondorScheduler<CondorCli> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CondorClient> CondorScheduler<C> {
    pub fn with_client(client: C) -> Self {
        CondorScheduler { client }
    }
}

impl<C: CondorClient> Scheduler for CondorScheduler<C> {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Condor
    }

    fn submit(&self, dag: &Path, working_directory: &Path) -> Option<i64> {
        for attempt in 1..=SUBMIT_ATTEMPTS {
            match self.client.submit_dag(dag, working_directory) {
                Ok(cluster) => {
                    info!("HTCondor cluster id: {cluster}");
                    return Some(cluster);
                }
                Err(err) => warn!(
                    "Submitting {} failed (attempt {attempt} of {SUBMIT_ATTEMPTS}): {err}",
                    dag.display()
                ),
            }
        }
        None
    }

    fn status(&self, id: i64, job: &JobRecord) -> Option<SchedulerStatus> {
        let log = match find_nodes_log(&job.submit_path()) {
            Some(log) => log,
            None => {
                info!("No single DAG node log for HTCondor job {id} yet");
                return None;
            }
        };
        let contents = match fs::read_to_string(&log) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("Can't read event log {}: {err}", log.display());
                return None;
            }
        };
        evaluate(&parse_events(&contents))
    }

    fn cancel(&self, _id: i64, _job: &JobRecord) -> Result<()> {
        Err(BundleError::Unsupported("cancelling HTCondor jobs"))
    }
}

/// The one `*.submit.nodes.log` in the submit directory, if there is exactly one
fn find_nodes_log(submit_directory: &Path) -> Option<PathBuf> {
    let mut logs = fs::read_dir(submit_directory)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".submit.nodes.log"))
        });
    let log = logs.next()?;
    match logs.next() {
        Some(_) => {
            warn!("More than one DAG node log in {}", submit_directory.display());
            None
        }
        None => Some(log),
    }
}

fn is_generation(node: &str) -> bool {
    node.starts_with("generation")
}

fn is_plot(node: &str) -> bool {
    node.ends_with("_plot")
}

/// Derive the DAG's status by replaying its node events in order
pub fn evaluate(events: &[Event]) -> Option<SchedulerStatus> {
    let last = events.last()?;
    let running = SchedulerStatus::new(JobStatus::Running, "Running");
    match last.kind {
        EventKind::Submit => match last.node.as_deref() {
            Some(node) if is_generation(node) => {
                Some(SchedulerStatus::new(JobStatus::Queued, "Queued"))
            }
            _ => Some(running),
        },
        EventKind::Execute
        | EventKind::JobEvicted
        | EventKind::JobHeld
        | EventKind::JobReleased => Some(running),
        EventKind::JobAborted => {
            Some(SchedulerStatus::new(JobStatus::Cancelled, "Job was aborted"))
        }
        EventKind::JobTerminated => Some(replay_terminations(events)),
        EventKind::Other(code) => {
            info!("Unhandled HTCondor event {code:03} at end of node log");
            None
        }
    }
}

fn replay_terminations(events: &[Event]) -> SchedulerStatus {
    let mut submitted: HashMap<i64, String> = HashMap::new();
    let mut plot_submitted = false;
    for event in events.iter().filter(|e| e.kind == EventKind::Submit) {
        let node = event.node.clone().unwrap_or_default();
        plot_submitted |= is_plot(&node);
        submitted.insert(event.cluster, node);
    }

    for event in events.iter().filter(|e| e.kind == EventKind::JobTerminated) {
        let node = submitted.remove(&event.cluster).unwrap_or_default();
        match event.termination {
            Some(termination) if termination.is_success() => {}
            Some(termination) => {
                return SchedulerStatus::new(
                    JobStatus::Error,
                    format!("Stage {node} {termination}"),
                );
            }
            None => {
                return SchedulerStatus::new(
                    JobStatus::Error,
                    format!("Stage {node} terminated without a return value"),
                );
            }
        }
    }

    if submitted.is_empty() && plot_submitted {
        SchedulerStatus::new(JobStatus::Completed, "Completed")
    } else {
        SchedulerStatus::new(JobStatus::Running, "Running")
    }
}

#[cfg(test)]
mod tests {
    use super::event::Termination;
    use super::*;

    fn submit(cluster: i64, node: &str) -> Event {
        Event { kind: EventKind::Submit, cluster, node: Some(node.to_string()), termination: None }
    }

    fn event(kind: EventKind, cluster: i64) -> Event {
        Event { kind, cluster, node: None, termination: None }
    }

    fn terminated(cluster: i64, return_value: i32) -> Event {
        Event {
            kind: EventKind::JobTerminated,
            cluster,
            node: None,
            termination: Some(Termination::Normal { return_value }),
        }
    }

    fn status(events: &[Event]) -> Option<JobStatus> {
        evaluate(events).map(|s| s.status)
    }

    #[test]
    fn generation_submit_is_queued() {
        assert_eq!(status(&[submit(1, "generation")]), Some(JobStatus::Queued));
    }

    #[test]
    fn later_submit_is_running() {
        let events = [submit(1, "generation"), terminated(1, 0), submit(2, "analysis_H1L1")];
        assert_eq!(status(&events), Some(JobStatus::Running));
    }

    #[test]
    fn transient_events_are_running() {
        let transient = [
            EventKind::Execute,
            EventKind::JobHeld,
            EventKind::JobReleased,
            EventKind::JobEvicted,
        ];
        for kind in transient {
            let events = [submit(1, "generation"), event(kind, 1)];
            assert_eq!(status(&events), Some(JobStatus::Running), "{kind:?}");
        }
    }

    #[test]
    fn aborted_is_cancelled() {
        let events = [submit(1, "generation"), event(EventKind::JobAborted, 1)];
        assert_eq!(status(&events), Some(JobStatus::Cancelled));
    }

    #[test]
    fn all_stages_terminated_with_plot_is_completed() {
        let events = [
            submit(1, "generation"),
            terminated(1, 0),
            submit(2, "analysis_H1L1"),
            terminated(2, 0),
            submit(3, "analysis_H1L1_final_result"),
            submit(4, "analysis_H1L1_plot"),
            terminated(4, 0),
            terminated(3, 0),
        ];
        assert_eq!(status(&events), Some(JobStatus::Completed));
    }

    #[test]
    fn terminated_before_plot_is_running() {
        let events = [submit(1, "generation"), terminated(1, 0)];
        assert_eq!(status(&events), Some(JobStatus::Running));

        let events = [
            submit(3, "analysis_H1_final_result"),
            submit(4, "analysis_H1_plot"),
            terminated(4, 0),
        ];
        assert_eq!(status(&events), Some(JobStatus::Running));
    }

    #[test]
    fn failed_stage_is_error_regardless_of_later_stages() {
        let events = [
            submit(1, "generation"),
            terminated(1, 0),
            submit(2, "analysis_H1"),
            terminated(2, 1),
            submit(3, "analysis_H1_final_result"),
            submit(4, "analysis_H1_plot"),
            terminated(3, 0),
            terminated(4, 0),
        ];
        let status = evaluate(&events).unwrap();
        assert_eq!(status.status, JobStatus::Error);
        assert!(status.info.contains("analysis_H1"));
    }

    #[test]
    fn abnormal_termination_is_error() {
        let events = [
            submit(1, "generation"),
            Event {
                kind: EventKind::JobTerminated,
                cluster: 1,
                node: None,
                termination: Some(Termination::Abnormal { signal: 9 }),
            },
        ];
        assert_eq!(status(&events), Some(JobStatus::Error));
    }

    #[test]
    fn unhandled_last_event_is_indeterminate() {
        assert_eq!(status(&[submit(1, "generation"), event(EventKind::Other(6), 1)]), None);
        assert_eq!(status(&[]), None);
    }

    #[test]
    fn parses_condor_submit_output() {
        let stdout = "Submitting job(s).\n1 job(s) submitted to cluster 1234.\n";
        assert_eq!(parse_cluster_id(stdout), Some(1234));
        assert_eq!(parse_cluster_id("ERROR: no such file"), None);
    }
}
