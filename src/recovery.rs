//! Recovery sweep (spec §5 "Recovery sweep", §2.5 of SPEC_FULL.md):
//! periodically finds stuck, non-terminal sagas and resubmits them via
//! `resume(is_recovery = true)`. Grounded in the teacher's
//! `start_health_check_loop` `tokio::select!` pattern.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Notify;
use tracing::{error, info};

use crate::config::RecoveryConfig;
use crate::engine::{ResumeSagaCommand, SagaEngine};
use crate::persistence::PersistencePort;

pub struct RecoverySweep {
    engine: Arc<SagaEngine>,
    persistence: Arc<dyn PersistencePort>,
    config: RecoveryConfig,
    shutdown: Arc<Notify>,
}

impl RecoverySweep {
    pub fn new(engine: Arc<SagaEngine>, persistence: Arc<dyn PersistencePort>, config: RecoveryConfig) -> Self {
        Self { engine, persistence, config, shutdown: Arc::new(Notify::new()) }
    }

    /// Spawn the background loop. Returns immediately; call `shutdown()` to
    /// stop it.
    pub fn start(&self) {
        let engine = self.engine.clone();
        let persistence = self.persistence.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(StdDuration::from_secs(config.interval_seconds));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::sweep_once(&engine, &persistence, &config).await;
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    async fn sweep_once(engine: &SagaEngine, persistence: &Arc<dyn PersistencePort>, config: &RecoveryConfig) {
        let older_than = Utc::now() - ChronoDuration::seconds(config.staleness_seconds);
        let stuck = match persistence.find_stuck_sagas(older_than, config.batch_limit).await {
            Ok(stuck) => stuck,
            Err(e) => {
                error!(error = %e, "recovery sweep failed to query stuck sagas");
                return;
            }
        };

        if stuck.is_empty() {
            return;
        }
        info!(count = stuck.len(), "recovery sweep resubmitting stuck sagas");

        for ctx in stuck {
            let order_id = ctx.order_id;
            if let Err(e) = engine
                .resume(ResumeSagaCommand {
                    order_id,
                    step_id: None,
                    callback_result: None,
                    is_recovery: true,
                    source: "recovery_sweep".to_string(),
                })
                .await
            {
                error!(order_id = %order_id, error = %e, "recovery sweep failed to resume saga");
            }
        }
    }
}
