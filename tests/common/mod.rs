#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use bilby_bundle::db::{JobRecord, JobStore};
use bilby_bundle::request::job::{JobParameters, SubmitDetails};
use bilby_bundle::scheduler::{Scheduler, SchedulerStatus};
use bilby_bundle::settings::{SchedulerKind, Settings};
use bilby_bundle::status::JobStatus;
use bilby_bundle::submit::supporting::FileFetcher;
use bilby_bundle::{BundleError, Result};
use tempfile::TempDir;

/// Scheduler double with scripted answers
pub struct MockScheduler {
    pub kind: SchedulerKind,
    pub submit_result: Option<i64>,
    pub statuses: RefCell<HashMap<i64, SchedulerStatus>>,
    pub submitted: RefCell<Vec<PathBuf>>,
    pub cancelled: RefCell<Vec<i64>>,
}

impl MockScheduler {
    pub fn new(kind: SchedulerKind, submit_result: Option<i64>) -> Self {
        MockScheduler {
            kind,
            submit_result,
            statuses: RefCell::new(HashMap::new()),
            submitted: RefCell::new(Vec::new()),
            cancelled: RefCell::new(Vec::new()),
        }
    }

    pub fn set_status(&self, id: i64, status: JobStatus) {
        self.statuses
            .borrow_mut()
            .insert(id, SchedulerStatus::new(status, status.to_string()));
    }
}

impl Scheduler for MockScheduler {
    fn kind(&self) -> SchedulerKind {
        self.kind
    }

    fn submit(&self, script: &Path, _working_directory: &Path) -> Option<i64> {
        self.submitted.borrow_mut().push(script.to_path_buf());
        self.submit_result
    }

    fn status(&self, id: i64, _job: &JobRecord) -> Option<SchedulerStatus> {
        self.statuses.borrow().get(&id).cloned()
    }

    fn cancel(&self, id: i64, _job: &JobRecord) -> Result<()> {
        self.cancelled.borrow_mut().push(id);
        Ok(())
    }
}

/// Fetcher for jobs without supporting files
pub struct NoFetch;

impl FileFetcher for NoFetch {
    fn fetch(&self, token: &str) -> Result<Vec<u8>> {
        Err(BundleError::InvalidParameters(format!("unexpected fetch of {token}")))
    }
}

/// A job root, job store and environment script in a temporary directory
pub struct TestHarness {
    pub dir: TempDir,
    pub settings: Settings,
    pub store: JobStore,
}

impl TestHarness {
    pub fn new(scheduler: SchedulerKind) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut settings =
            Settings::new(dir.path().join("jobs"), dir.path().join("cache"), scheduler);

        // stand-ins for the bilby executables, sourced by every stage script
        let env = dir.path().join("activate.sh");
        fs::write(
            &env,
            "bilby_pipe_generation() { echo \"generating $*\"; }\n\
             bilby_pipe_analysis() { echo \"analysing $*\"; }\n",
        )
        .expect("write environment script");
        settings.scheduler_env = Some(env);

        let store = JobStore::open(&settings.store_path()).expect("open job store");
        TestHarness { dir, settings, store }
    }

    pub fn working_directory(&self, job_id: i64) -> PathBuf {
        self.settings.job_root.join(job_id.to_string())
    }
}

pub fn details(job_id: i64) -> SubmitDetails {
    SubmitDetails { job_id }
}

pub fn params(ini: &str) -> JobParameters {
    JobParameters {
        name: "test job".to_string(),
        description: Some("integration test".to_string()),
        ini_string: ini.to_string(),
        supporting_files: Vec::new(),
    }
}

pub fn record(job_id: i64, submit_id: Option<i64>, working_directory: &Path) -> JobRecord {
    JobRecord {
        job_id,
        submit_id,
        working_directory: working_directory.to_string_lossy().into_owned(),
        submit_directory: "submit".to_string(),
    }
}
