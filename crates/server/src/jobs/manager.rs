// crates/server/src/jobs/manager.rs
//! Central registry for background jobs.
//!
//! One mutex guards the whole registry; progress updates and status
//! transitions are serialized so readers always see consistent snapshots.
//! At most one job of each type is running at any instant. The registry is
//! process-lifetime: only admin-invoked and periodic jobs enter it, so it
//! stays small.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use gitscout_core::models::{Job, JobStatus, JobType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("{0} job already running")]
    AlreadyRunning(JobType),
}

/// Reporter handed to a job body; updates the job's `"current/total"`
/// progress string.
#[derive(Clone)]
pub struct ProgressHandle {
    manager: Arc<JobManager>,
    id: Uuid,
}

impl ProgressHandle {
    pub fn update(&self, current: usize, total: usize) {
        let mut jobs = self.manager.jobs.lock().expect("job registry lock");
        if let Some(job) = jobs.get_mut(&self.id) {
            job.progress = format!("{current}/{total}");
        }
    }
}

#[derive(Default)]
pub struct JobManager {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit and spawn a background job.
    ///
    /// Fails with [`JobError::AlreadyRunning`] if a job of the same type is
    /// still running. The body runs on a fresh task with its own lifetime:
    /// an admin-triggered job survives the admin disconnecting.
    pub fn start_job<F, Fut>(self: &Arc<Self>, job_type: JobType, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let job = {
            let mut jobs = self.jobs.lock().expect("job registry lock");
            if jobs
                .values()
                .any(|j| j.job_type == job_type && j.status == JobStatus::Running)
            {
                return Err(JobError::AlreadyRunning(job_type));
            }

            let job = Job {
                id: Uuid::new_v4(),
                job_type,
                status: JobStatus::Running,
                progress: "0/0".into(),
                started_at: Utc::now(),
                error: None,
            };
            jobs.insert(job.id, job.clone());
            job
        };

        let manager = Arc::clone(self);
        let id = job.id;
        let handle = ProgressHandle {
            manager: Arc::clone(self),
            id,
        };
        tokio::spawn(async move {
            let result = f(handle).await;
            let mut jobs = manager.jobs.lock().expect("job registry lock");
            let Some(job) = jobs.get_mut(&id) else { return };
            match result {
                Ok(()) => {
                    job.status = JobStatus::Completed;
                    tracing::info!(job_id = %id, job_type = %job_type, "job completed");
                }
                Err(err) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(err.to_string());
                    tracing::error!(job_id = %id, job_type = %job_type, error = %err, "job failed");
                }
            }
        });

        Ok(job)
    }

    /// Point-in-time snapshot of every job, newest first.
    pub fn jobs(&self) -> Vec<Job> {
        let jobs = self.jobs.lock().expect("job registry lock");
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().expect("job registry lock").get(&id).cloned()
    }
}
