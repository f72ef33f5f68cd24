// crates/server/src/ingest/scheduler.rs
//! Periodic discovery driver.
//!
//! Waits a short settle delay after boot, runs discovery once, then fires
//! on the configured interval. Admission failures (a run is still going)
//! are logged and the tick is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::discovery::Discovery;

const STARTUP_DELAY: Duration = Duration::from_secs(30);

pub struct Scheduler {
    discovery: Arc<Discovery>,
    interval: Duration,
    startup_delay: Duration,
}

/// Running scheduler task; dropping the handle does not stop it, `stop`
/// does.
pub struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Unblock the scheduler's select and let the task return.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}

impl Scheduler {
    pub fn new(discovery: Arc<Discovery>, interval: Duration) -> Self {
        Self {
            discovery,
            interval,
            startup_delay: STARTUP_DELAY,
        }
    }

    /// Shrink the post-boot settle delay (tests).
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "scheduler started");

            // Let the server stabilize before the first run.
            tokio::select! {
                _ = tokio::time::sleep(self.startup_delay) => self.run_discovery(),
                _ = &mut stop_rx => return,
            }

            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately; the startup run above
            // already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_discovery(),
                    _ = &mut stop_rx => {
                        info!("scheduler stopped");
                        return;
                    }
                }
            }
        });

        SchedulerHandle { stop_tx, task }
    }

    fn run_discovery(&self) {
        info!("scheduler: triggering auto-discovery");
        match self.discovery.discover() {
            Ok(job) => info!(job_id = %job.id, "scheduler: discovery job started"),
            Err(err) => warn!(error = %err, "scheduler: discovery failed to start"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Indexer;
    use crate::jobs::JobManager;
    use gitscout_core::models::JobType;
    use gitscout_db::memory::InMemoryStore;
    use gitscout_github::GitHubClient;

    async fn discovery_against(server: &mockito::Server) -> (Arc<Discovery>, Arc<JobManager>) {
        let store = Arc::new(InMemoryStore::new());
        let github = Arc::new(GitHubClient::with_base_urls(
            "id",
            "secret",
            server.url(),
            server.url(),
        ));
        let indexer = Arc::new(Indexer::new(github.clone(), store.clone(), store.clone()));
        let jobs = Arc::new(JobManager::new());
        (
            Arc::new(Discovery::new(github, store, indexer, jobs.clone())),
            jobs,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scheduler_runs_discovery_after_startup_delay() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/search/repositories.*".into()))
            .with_status(200)
            .with_body(r#"{"total_count": 0, "items": []}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let (discovery, jobs) = discovery_against(&server).await;
        let handle = Scheduler::new(discovery, Duration::from_secs(3600))
            .with_startup_delay(Duration::from_millis(20))
            .start();

        // The startup run registers a discovery job shortly after boot.
        let mut started = false;
        for _ in 0..100 {
            if jobs.jobs().iter().any(|j| j.job_type == JobType::Discovery) {
                started = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.stop().await;
        assert!(started, "scheduler never started a discovery job");
    }

    #[tokio::test]
    async fn test_scheduler_stop_before_first_run() {
        let server = mockito::Server::new_async().await;
        let (discovery, jobs) = discovery_against(&server).await;

        let handle = Scheduler::new(discovery, Duration::from_secs(3600)).start();
        // Stop during the 30s startup delay; no job must have been started.
        handle.stop().await;
        assert!(jobs.jobs().is_empty());
    }
}
