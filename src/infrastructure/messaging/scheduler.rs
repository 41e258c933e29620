use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::ports::job_queue::{JobQueue, PROCESS_QUEUE};
use crate::application::services::ai_gateway::AiGateway;
use crate::application::services::taxonomy_service::TaxonomyService;
use crate::infrastructure::messaging::enqueuer::Enqueuer;

/// Periodic maintenance: returns lease-expired jobs to the ready queue,
/// re-enqueues stuck documents, refreshes the taxonomy snapshot, and
/// emits counters.
pub struct Scheduler {
    queue: Arc<dyn JobQueue>,
    enqueuer: Arc<Enqueuer>,
    taxonomy: Arc<TaxonomyService>,
    gateway: Arc<AiGateway>,
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        enqueuer: Arc<Enqueuer>,
        taxonomy: Arc<TaxonomyService>,
        gateway: Arc<AiGateway>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            queue,
            enqueuer,
            taxonomy,
            gateway,
            interval,
            shutdown_tx,
        }
    }

    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        let mut shutdown_rx = scheduler.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => scheduler.tick().await,
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Scheduler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn tick(&self) {
        match self.queue.requeue_expired(PROCESS_QUEUE).await {
            Ok(count) if count > 0 => {
                info!(count, "Returned lease-expired jobs to the ready queue");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Expired-lease requeue failed"),
        }

        self.enqueuer.sweep_stuck().await;

        if let Err(err) = self.taxonomy.refresh_if_stale().await {
            warn!(error = %err, "Taxonomy snapshot refresh failed");
        }

        let depth = self.queue.depth(PROCESS_QUEUE).await.unwrap_or(0);
        let provider_states: Vec<String> = self
            .gateway
            .provider_states()
            .into_iter()
            .map(|(name, state, skipped)| format!("{}={:?}(skipped={})", name, state, skipped))
            .collect();
        info!(
            queue_depth = depth,
            providers = %provider_states.join(","),
            "Scheduler tick"
        );
    }
}
