//! Periodic ping-and-evict cycle for half-open observer connections.
//!
//! Each session moves through `alive → probed (alive = false) → pong
//! (alive = true)`; a session still marked not-alive at the next tick is
//! terminated. A silent session is therefore gone within two periods.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::ConnectionRegistry;
use crate::config::non_zero;

/// Runs [`ConnectionRegistry::sweep`] on a fixed period.
#[derive(Debug)]
pub struct LivenessSweeper {
    registry: Arc<ConnectionRegistry>,
    period: Duration,
}

impl LivenessSweeper {
    /// Creates a sweeper for `registry` ticking every `period`.
    ///
    /// A zero period is raised to [`MIN_PERIOD`](crate::config::MIN_PERIOD).
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, period: Duration) -> Self {
        Self {
            registry,
            period: non_zero(period),
        }
    }

    /// Spawns the sweep loop. The first sweep runs one period after start.
    #[must_use]
    pub fn spawn(self) -> SweeperHandle {
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = self.registry.sweep().await;
                if report.evicted > 0 {
                    tracing::info!(
                        probed = report.probed,
                        evicted = report.evicted,
                        "liveness sweep"
                    );
                } else {
                    tracing::trace!(probed = report.probed, "liveness sweep");
                }
            }
        });
        tracing::debug!(period = ?period, "liveness sweeper started");
        SweeperHandle { task }
    }
}

/// Owner of a running sweeper task. Dropping it stops the sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper.
    pub fn stop(self) {
        drop(self);
    }

    /// Returns `true` once the sweeper task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::ws::Outbound;

    #[tokio::test(start_paused = true)]
    async fn silent_session_evicted_within_two_periods() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let (_id, mut rx) = registry.on_open().await;
        let _sweeper = registry.start_liveness_sweeper(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(registry.count().await, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some(Outbound::Ping));
        assert_eq!(registry.count().await, 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(registry.count().await, 0);
        assert_eq!(rx.recv().await, Some(Outbound::Terminate));
    }

    #[tokio::test(start_paused = true)]
    async fn responsive_session_survives() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let (id, mut rx) = registry.on_open().await;
        let _sweeper = registry.start_liveness_sweeper(Duration::from_secs(30));

        for _ in 0..4 {
            assert_eq!(rx.recv().await, Some(Outbound::Ping));
            registry.on_pong(id).await;
        }
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_sweeps() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let (_id, mut rx) = registry.on_open().await;
        let sweeper = registry.start_liveness_sweeper(Duration::ZERO);

        assert_eq!(rx.recv().await, Some(Outbound::Ping));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!sweeper.is_finished());
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_sweeps() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let (_id, _rx) = registry.on_open().await;
        let sweeper = registry.start_liveness_sweeper(Duration::from_secs(1));
        sweeper.stop();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(registry.count().await, 1);
    }
}
