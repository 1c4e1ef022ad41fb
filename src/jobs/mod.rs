use crate::{context::AppContext, metrics};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs. Abort the returned handles to stop them.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("Starting background job scheduler");

        let handles = vec![
            tokio::spawn(Self::stats_refresh_job(Arc::clone(&self))),
            tokio::spawn(Self::health_check_job(Arc::clone(&self))),
        ];

        info!("Background jobs started");
        handles
    }

    /// Refresh status gauges
    async fn stats_refresh_job(scheduler: Arc<Self>) {
        let secs = scheduler.context.config.jobs.stats_interval_secs;
        let mut interval = interval(Duration::from_secs(secs));

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::refresh_status_counts(&scheduler.context).await {
                Ok(stats) => {
                    debug!(
                        "Registry holds {} records ({} pending, {} active)",
                        stats.total, stats.pending, stats.active
                    );
                    metrics::record_background_job(
                        "stats_refresh",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Failed to refresh registry stats: {}", e);
                    metrics::record_background_job(
                        "stats_refresh",
                        "failure",
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }

    /// Storage health check
    async fn health_check_job(scheduler: Arc<Self>) {
        let secs = scheduler.context.config.jobs.health_interval_secs;
        let mut interval = interval(Duration::from_secs(secs));

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                    metrics::record_background_job(
                        "health_check",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Health check failed: {}", e);
                    metrics::record_background_job(
                        "health_check",
                        "failure",
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }
}
