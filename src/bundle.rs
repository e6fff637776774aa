//! Entry points called by the job controller

use std::fs;

use log::{info, warn};
use serde_json::Value;

use crate::aggregate::StatusAggregator;
use crate::db::JobStore;
use crate::pipe::cwd::absolute;
use crate::pipe::slurm::read_slurm_ids;
use crate::request::job::{JobParameters, StatusDetails, SubmitDetails};
use crate::scheduler::{self, Scheduler};
use crate::settings::Settings;
use crate::status::StatusResponse;
use crate::submit::supporting::{FileFetcher, HttpFetcher};
use crate::submit::{working_directory, SubmissionPipeline};
use crate::{BundleError, Result};

/// Submits, polls and removes jobs on one scheduler backend
pub struct Bundle {
    settings: Settings,
    store: JobStore,
    scheduler: Box<dyn Scheduler>,
    fetcher: Box<dyn FileFetcher>,
}

impl Bundle {
    pub fn new(
        settings: Settings,
        store: JobStore,
        scheduler: Box<dyn Scheduler>,
        fetcher: Box<dyn FileFetcher>,
    ) -> Bundle {
        Bundle { settings, store, scheduler, fetcher }
    }

    /// Open the job store and build the scheduler and file fetcher `settings` describe
    pub fn from_settings(settings: Settings) -> Result<Bundle> {
        let store = JobStore::open(&settings.store_path())?;
        let scheduler = scheduler::from_settings(&settings);
        let fetcher = Box::new(HttpFetcher::new(&settings.job_controller_url)?);
        Ok(Bundle::new(settings, store, scheduler, fetcher))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&mut self) -> &mut JobStore {
        &mut self.store
    }

    /// Submit a job, returning the id to poll it with, or `None` if the scheduler refused it
    pub fn submit(
        &mut self,
        details: &SubmitDetails,
        params: &JobParameters,
    ) -> Result<Option<i64>> {
        let pipeline = SubmissionPipeline {
            settings: &self.settings,
            scheduler: self.scheduler.as_ref(),
            fetcher: self.fetcher.as_ref(),
        };
        pipeline.submit(&mut self.store, details, params)
    }

    pub fn status(&mut self, details: &StatusDetails) -> Result<StatusResponse> {
        let mut aggregator = StatusAggregator {
            store: &mut self.store,
            scheduler: self.scheduler.as_ref(),
        };
        aggregator.status(details)
    }

    /// Remove a job's working directory. Failures are logged and otherwise ignored.
    pub fn delete(&mut self, details: &SubmitDetails, _job_data: &Value) {
        let path = working_directory(&self.settings.job_root, details);
        let path = match absolute(&path) {
            Ok(path) => path,
            Err(err) => {
                warn!("Can't resolve {}: {err}", path.display());
                return;
            }
        };
        info!("Deleting working directory {}", path.display());
        if let Err(err) = fs::remove_dir_all(&path) {
            warn!("Can't delete {}: {err}", path.display());
        }
    }

    /// Cancel a job's outer submission and every stage it has submitted
    ///
    /// The job stays in the job store; the next status poll sees it cancelled and removes it.
    pub fn cancel(&mut self, details: &StatusDetails) -> Result<()> {
        let job = self
            .store
            .get_job(details.scheduler_id)?
            .ok_or(BundleError::JobNotFound(details.scheduler_id))?;
        if let Some(submit_id) = job.submit_id {
            self.scheduler.cancel(submit_id, &job)?;
        }
        for (name, id) in read_slurm_ids(&job.submit_path())? {
            if let Some(id) = id {
                info!("Cancelling stage {name} of job {}", job.job_id);
                self.scheduler.cancel(id, &job)?;
            }
        }
        Ok(())
    }
}
