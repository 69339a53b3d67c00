//! Background expiry sweeping.
//!
//! Each store with expiring entries implements [`Sweep`]. The composition
//! root spawns one task per store and flips a `watch` channel to stop them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::AuthError;

/// A store whose expired entries can be purged in one pass.
pub trait Sweep: Send + Sync {
    /// Store name used in log fields.
    fn name(&self) -> &'static str;

    /// Remove every expired entry and return how many were removed.
    fn sweep_expired(&self) -> Result<usize, AuthError>;
}

/// Spawn a task that sweeps `target` every `period` until `shutdown` turns true.
///
/// Sweep failures are logged and retried on the next tick.
pub fn spawn_sweeper(
    target: Arc<dyn Sweep>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    // tokio panics on a zero period
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => match target.sweep_expired() {
                    Ok(removed) => debug!(store = target.name(), removed, "expiry sweep"),
                    Err(e) => warn!(store = target.name(), error = %e, "expiry sweep failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(store = target.name(), "sweeper stopped");
                        break;
                    }
                }
            }
        }
    })
}
