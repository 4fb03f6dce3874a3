//! Background workers: the heartbeat/failure-detection loop and the slower
//! cluster-refresh backstop.
//!
//! Each worker is an independently spawned fixed-rate task; the cycle bodies
//! live on [`ClusterService`] and swallow their own failures, so a bad cycle
//! never kills the loop.

use crate::cluster::engine::ClusterService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Spawn the heartbeat/failure-detection loop. Fires immediately, then on
/// every heartbeat interval.
pub fn spawn_heartbeat_worker(service: Arc<ClusterService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(service.config().heartbeat_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_ok: i64 = -1;
        loop {
            ticker.tick().await;
            last_ok = service.heartbeat_cycle(last_ok).await;
        }
    })
}

/// Spawn the registry-refresh loop. First fire after one full interval.
pub fn spawn_refresh_worker(service: Arc<ClusterService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = service.config().cluster_refresh_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            service.refresh_cycle().await;
        }
    })
}
