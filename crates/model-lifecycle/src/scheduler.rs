use std::sync::Arc;
use std::time::Duration as StdDuration;

use core_types::Horizon;
use tokio::signal::unix::SignalKind;
use tokio::sync::Mutex;
use tokio::time::{self, Interval};

use crate::auto::AutoLifecycleController;
use crate::error::LifecycleResult;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub horizons: Vec<Horizon>,
    pub promotion_interval: StdDuration,
    pub rollback_interval: StdDuration,
    pub promotion_enabled: bool,
    pub rollback_enabled: bool,
    pub startup_delay: StdDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            horizons: vec![Horizon::M15, Horizon::H1, Horizon::H4, Horizon::D1],
            promotion_interval: StdDuration::from_secs(6 * 3600),
            rollback_interval: StdDuration::from_secs(3 * 3600),
            promotion_enabled: true,
            rollback_enabled: true,
            startup_delay: StdDuration::from_secs(30),
        }
    }
}

/// Drives `AutoLifecycleController` on two independent ticks. Promotion and
/// rollback passes never run concurrently — both acquire the same lock —
/// since a promotion and a rollback racing on the same horizon would fight
/// over the registry's active pointer.
pub struct LifecycleScheduler {
    controller: Arc<AutoLifecycleController>,
    config: SchedulerConfig,
    lifecycle_lock: Mutex<()>,
}

impl LifecycleScheduler {
    pub fn new(controller: Arc<AutoLifecycleController>, config: SchedulerConfig) -> Self {
        Self { controller, config, lifecycle_lock: Mutex::new(()) }
    }

    fn intervals(&self) -> (Interval, Interval) {
        let mut promotion = time::interval(self.config.promotion_interval);
        promotion.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut rollback = time::interval(self.config.rollback_interval);
        rollback.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        (promotion, rollback)
    }

    async fn promotion_tick(&self) {
        if !self.config.promotion_enabled {
            return;
        }
        let _guard = self.lifecycle_lock.lock().await;
        match self.controller.run_promotion_pass(&self.config.horizons).await {
            Ok(summary) => tracing::info!(
                promotions = summary.promotions,
                skipped_kill_switch = summary.skipped_kill_switch,
                skipped_promotion_locked = summary.skipped_promotion_locked,
                "promotion pass complete"
            ),
            Err(err) => tracing::error!(%err, "promotion pass failed"),
        }
    }

    async fn rollback_tick(&self) {
        if !self.config.rollback_enabled {
            return;
        }
        let _guard = self.lifecycle_lock.lock().await;
        match self.controller.run_rollback_pass(&self.config.horizons).await {
            Ok(summary) => tracing::info!(rollbacks = summary.rollbacks, skipped_kill_switch = summary.skipped_kill_switch, "rollback pass complete"),
            Err(err) => tracing::error!(%err, "rollback pass failed"),
        }
    }

    /// Runs until SIGINT or SIGTERM. An initial pass of each enabled kind
    /// fires after `startup_delay` rather than waiting for the first full
    /// interval.
    pub async fn run(self: Arc<Self>) -> LifecycleResult<()> {
        if self.config.promotion_enabled || self.config.rollback_enabled {
            time::sleep(self.config.startup_delay).await;
            if self.config.promotion_enabled {
                self.promotion_tick().await;
            }
            if self.config.rollback_enabled {
                self.rollback_tick().await;
            }
        }

        let (mut promotion_interval, mut rollback_interval) = self.intervals();
        let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate()).map_err(|err| {
            tracing::error!(%err, "failed to install SIGTERM handler");
            err
        });

        loop {
            let shutdown = async {
                match &mut sigterm {
                    Ok(signal) => {
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {}
                            _ = signal.recv() => {}
                        }
                    }
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
            };

            tokio::select! {
                _ = promotion_interval.tick() => {
                    self.promotion_tick().await;
                }
                _ = rollback_interval.tick() => {
                    self.rollback_tick().await;
                }
                _ = shutdown => {
                    tracing::info!("lifecycle scheduler shutting down");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_both_passes_with_the_documented_intervals() {
        let config = SchedulerConfig::default();
        assert!(config.promotion_enabled);
        assert!(config.rollback_enabled);
        assert_eq!(config.promotion_interval, StdDuration::from_secs(6 * 3600));
        assert_eq!(config.rollback_interval, StdDuration::from_secs(3 * 3600));
    }
}
