//! Periodic ingestion
//!
//! Runs the ingestion pipeline on a fixed interval in a background task.
//! The first run happens one full interval after start.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::ingestion::IngestionPipeline;

/// Default ingestion period
pub const DEFAULT_INGEST_INTERVAL: Duration = Duration::from_secs(3600);

pub struct IngestionScheduler {
    pipeline: Arc<IngestionPipeline>,
    period: Duration,
}

impl IngestionScheduler {
    pub fn new(pipeline: Arc<IngestionPipeline>, period: Duration) -> Self {
        Self { pipeline, period }
    }

    /// Spawn the ingestion loop; abort the handle to stop it
    pub fn start(self) -> JoinHandle<()> {
        info!(
            "Starting ingestion scheduler with interval {}s",
            self.period.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                info!("Scheduled ingestion starting");
                match self.pipeline.run().await {
                    Ok(report) => info!(
                        "Scheduled ingestion done: {} new articles",
                        report.inserted
                    ),
                    Err(e) => error!("Scheduled ingestion failed: {}", e),
                }
            }
        })
    }
}
