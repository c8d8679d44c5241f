//! # Expiry Sweeper
//!
//! Background liveness enforcement. Each tick expires every task that
//! overstayed one of its timeout budgets, reclaiming admission capacity for
//! tasks whose Processor crashed, stalled or went silent. The sweep is a
//! single batch statement with `SKIP LOCKED` semantics, so it coexists with
//! live claims and a row it cannot lock simply waits for the next tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::SweeperConfig;
use crate::scheduler::Scheduler;

/// Runtime counters for the sweeper
#[derive(Debug, Default)]
pub struct SweeperStats {
    /// Completed sweep ticks
    pub ticks: AtomicU64,
    /// Tasks transitioned to EXPIRED
    pub tasks_expired: AtomicU64,
    /// Failed sweep attempts
    pub sweep_errors: AtomicU64,
}

/// Periodic timeout sweep over the task store
#[derive(Debug)]
pub struct ExpirySweeper {
    sweeper_id: Uuid,
    scheduler: Scheduler,
    config: SweeperConfig,
    is_running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    stats: Arc<SweeperStats>,
}

impl ExpirySweeper {
    pub fn new(scheduler: Scheduler, config: SweeperConfig) -> Self {
        Self {
            sweeper_id: Uuid::new_v4(),
            scheduler,
            config,
            is_running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            stats: Arc::new(SweeperStats::default()),
        }
    }

    /// Spawn the sweep loop; returns its join handle
    ///
    /// A disabled sweeper spawns a loop that exits immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let sweeper_id = self.sweeper_id;
        let scheduler = self.scheduler.clone();
        let config = self.config.clone();
        let is_running = self.is_running.clone();
        let shutdown = self.shutdown.clone();
        let stats = self.stats.clone();

        tokio::spawn(async move {
            if !config.enabled {
                info!(sweeper_id = %sweeper_id, "expiry sweeper disabled by configuration");
                return;
            }

            let interval = Duration::from_millis(config.tick_interval_ms);
            is_running.store(true, Ordering::SeqCst);
            info!(
                sweeper_id = %sweeper_id,
                tick_interval = ?interval,
                batch_size = config.batch_size,
                "expiry sweeper started"
            );

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        Self::sweep_cycle(&scheduler, &config, &stats).await;
                    }
                    _ = shutdown.notified() => {
                        info!(sweeper_id = %sweeper_id, "expiry sweeper shutting down");
                        break;
                    }
                }
            }

            is_running.store(false, Ordering::SeqCst);
        })
    }

    async fn sweep_cycle(scheduler: &Scheduler, config: &SweeperConfig, stats: &SweeperStats) {
        stats.ticks.fetch_add(1, Ordering::Relaxed);
        match scheduler.expire_overdue(config.batch_size).await {
            Ok(expired) if expired.is_empty() => {
                debug!("sweep found nothing overdue");
            }
            Ok(expired) => {
                stats
                    .tasks_expired
                    .fetch_add(expired.len() as u64, Ordering::Relaxed);
                info!(expired = expired.len(), "sweep expired overdue tasks");
            }
            Err(e) => {
                stats.sweep_errors.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "expiry sweep failed");
            }
        }
    }

    /// Ask the loop to exit after its current cycle
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &SweeperStats {
        &self.stats
    }
}
