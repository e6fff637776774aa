mod common;

use std::fs;
use std::path::Path;

use bilby_bundle::aggregate::{StatusAggregator, MISSING_JOB_INFO};
use bilby_bundle::db::JobRecord;
use bilby_bundle::request::job::StatusDetails;
use bilby_bundle::scheduler::{CondorScheduler, Scheduler};
use bilby_bundle::settings::SchedulerKind;
use bilby_bundle::status::{JobStatus, StatusResponse};

use common::{record, MockScheduler, TestHarness};

fn poll(harness: &mut TestHarness, scheduler: &dyn Scheduler, job_id: i64) -> StatusResponse {
    let mut aggregator = StatusAggregator { store: &mut harness.store, scheduler };
    aggregator.status(&StatusDetails { scheduler_id: job_id }).unwrap()
}

fn statuses(response: &StatusResponse) -> Vec<(&str, Option<JobStatus>)> {
    response.status.iter().map(|s| (s.what.as_str(), s.status)).collect()
}

/// Record a job whose submit directory already exists
fn add_job(harness: &mut TestHarness, job_id: i64, submit_id: Option<i64>) -> JobRecord {
    let workdir = harness.working_directory(job_id);
    let job = record(job_id, submit_id, &workdir);
    fs::create_dir_all(job.submit_path()).unwrap();
    harness.store.upsert(&job).unwrap();
    job
}

fn write_slurm_ids(job: &JobRecord, contents: &str) {
    fs::write(job.submit_path().join("slurm_ids"), contents).unwrap();
}

#[test]
fn test_missing_job() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);

    let response = poll(&mut harness, &scheduler, 12);
    assert!(response.complete);
    assert_eq!(statuses(&response), [("system", Some(JobStatus::Error))]);
    assert_eq!(response.status[0].info, MISSING_JOB_INFO);
}

#[test]
fn test_pending_submission() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    let job = add_job(&mut harness, 1, Some(500));
    scheduler.set_status(500, JobStatus::Queued);

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("submit", Some(JobStatus::Queued))]);
    assert_eq!(harness.store.get_job(1).unwrap(), Some(job));
}

#[test]
fn test_indeterminate_submission_is_not_fatal() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    add_job(&mut harness, 1, Some(500));

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("submit", None)]);
    assert!(harness.store.get_job(1).unwrap().is_some());
}

#[test]
fn test_failed_submission_finishes_job() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    let job = add_job(&mut harness, 1, Some(500));
    scheduler.set_status(500, JobStatus::OutOfMemory);
    // stages the master script managed to submit are not reported
    write_slurm_ids(&job, "generation 501\n");

    let response = poll(&mut harness, &scheduler, 1);
    assert!(response.complete);
    assert_eq!(statuses(&response), [("submit", Some(JobStatus::OutOfMemory))]);
    assert_eq!(harness.store.get_job(1).unwrap(), None);
}

#[test]
fn test_slurm_job_lifecycle() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    let job = add_job(&mut harness, 1, Some(500));

    // the master script ran and submitted every stage
    scheduler.set_status(500, JobStatus::Completed);
    write_slurm_ids(&job, "analysis_H1 601\nanalysis_H1_final_result 602\nanalysis_H1_plot 603\n");
    scheduler.set_status(601, JobStatus::Running);
    scheduler.set_status(602, JobStatus::Queued);
    scheduler.set_status(603, JobStatus::Queued);

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(
        statuses(&response),
        [
            ("submit", Some(JobStatus::Completed)),
            ("analysis_H1", Some(JobStatus::Running)),
            ("analysis_H1_final_result", Some(JobStatus::Queued)),
            ("analysis_H1_plot", Some(JobStatus::Queued)),
        ]
    );
    assert_eq!(harness.store.get_job(1).unwrap().unwrap().submit_id, None);

    // the master job has left sacct, its submission is still reported as done
    scheduler.statuses.borrow_mut().remove(&500);
    for id in [601, 602, 603] {
        scheduler.set_status(id, JobStatus::Completed);
    }
    let response = poll(&mut harness, &scheduler, 1);
    assert!(response.complete);
    assert!(response.status.iter().all(|s| s.status == Some(JobStatus::Completed)));
    assert_eq!(response.status.len(), 4);
    assert_eq!(harness.store.get_job(1).unwrap(), None);
}

#[test]
fn test_completed_submission_without_stages_is_in_flight() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    add_job(&mut harness, 1, None);

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("submit", Some(JobStatus::Completed))]);
}

#[test]
fn test_failed_stage_finishes_job() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    let job = add_job(&mut harness, 1, None);
    write_slurm_ids(&job, "generation 700\nanalysis_H1 701\n");
    scheduler.set_status(700, JobStatus::Completed);
    scheduler.set_status(701, JobStatus::WallTimeExceeded);

    let response = poll(&mut harness, &scheduler, 1);
    assert!(response.complete);
    assert_eq!(response.status[2].status, Some(JobStatus::WallTimeExceeded));
    assert_eq!(harness.store.get_job(1).unwrap(), None);
}

#[test]
fn test_unsubmitted_stage_is_error() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    let job = add_job(&mut harness, 1, None);
    write_slurm_ids(&job, "analysis_H1 701\nanalysis_H1_plot\n");
    scheduler.set_status(701, JobStatus::Running);

    let response = poll(&mut harness, &scheduler, 1);
    assert!(response.complete);
    assert_eq!(response.status[2].what, "analysis_H1_plot");
    assert_eq!(response.status[2].status, Some(JobStatus::Error));
}

#[test]
fn test_indeterminate_stage_keeps_job() {
    let mut harness = TestHarness::new(SchedulerKind::Slurm);
    let scheduler = MockScheduler::new(SchedulerKind::Slurm, None);
    let job = add_job(&mut harness, 1, None);
    write_slurm_ids(&job, "analysis_H1 701\nanalysis_H1_plot 702\n");
    scheduler.set_status(701, JobStatus::Completed);

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(response.status[2].status, None);
    assert!(harness.store.get_job(1).unwrap().is_some());
}

#[test]
fn test_condor_job_lifecycle() {
    let mut harness = TestHarness::new(SchedulerKind::Condor);
    let scheduler = MockScheduler::new(SchedulerKind::Condor, None);
    add_job(&mut harness, 1, Some(99));

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("all", None)]);

    scheduler.set_status(99, JobStatus::Running);
    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("all", Some(JobStatus::Running))]);

    scheduler.set_status(99, JobStatus::Completed);
    let response = poll(&mut harness, &scheduler, 1);
    assert!(response.complete);
    assert_eq!(statuses(&response), [("all", Some(JobStatus::Completed))]);
    assert_eq!(harness.store.get_job(1).unwrap(), None);
}

const NODES_LOG: &str = "\
000 (101.000.000) 2024-05-01 10:00:00 Job submitted from host: <10.0.0.1:9618>
    DAG Node: generation
...
001 (101.000.000) 2024-05-01 10:01:00 Job executing on host: <10.0.0.2:9618>
...
005 (101.000.000) 2024-05-01 10:30:00 Job terminated.
\t(1) Normal termination (return value 0)
...
000 (102.000.000) 2024-05-01 10:31:00 Job submitted from host: <10.0.0.1:9618>
    DAG Node: analysis_H1
...
";

fn write_nodes_log(submit_directory: &Path, contents: &str) {
    fs::write(submit_directory.join("dag_GW_test.submit.nodes.log"), contents).unwrap();
}

#[test]
fn test_condor_status_from_node_log() {
    let mut harness = TestHarness::new(SchedulerKind::Condor);
    let scheduler = CondorScheduler::new();
    let job = add_job(&mut harness, 1, Some(101));

    // no log yet
    let response = poll(&mut harness, &scheduler, 1);
    assert_eq!(statuses(&response), [("all", None)]);

    write_nodes_log(&job.submit_path(), NODES_LOG);
    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("all", Some(JobStatus::Running))]);

    let failed = format!(
        "{NODES_LOG}005 (102.000.000) 2024-05-01 12:00:00 Job terminated.\n\
         \t(1) Normal termination (return value 1)\n...\n"
    );
    write_nodes_log(&job.submit_path(), &failed);
    let response = poll(&mut harness, &scheduler, 1);
    assert!(response.complete);
    assert_eq!(statuses(&response), [("all", Some(JobStatus::Error))]);
    assert!(response.status[0].info.contains("analysis_H1"));
    assert_eq!(harness.store.get_job(1).unwrap(), None);
}

#[test]
fn test_condor_ambiguous_node_logs_are_indeterminate() {
    let mut harness = TestHarness::new(SchedulerKind::Condor);
    let scheduler = CondorScheduler::new();
    let job = add_job(&mut harness, 1, Some(101));
    write_nodes_log(&job.submit_path(), NODES_LOG);
    fs::write(job.submit_path().join("other.submit.nodes.log"), NODES_LOG).unwrap();

    let response = poll(&mut harness, &scheduler, 1);
    assert!(!response.complete);
    assert_eq!(statuses(&response), [("all", None)]);
}
