//! Periodic housekeeping for a LicenseHub store.
//!
//! The entitlement core does no background work on its own. This crate runs
//! the two periodic operations it defines, the monthly credit reset and
//! rate-sample pruning, either once or on a fixed interval.

use chrono::NaiveDate;
use licensehub_entitlement::{Entitlements, LicenseResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Outcome of one housekeeping pass.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SweepReport {
    pub as_of: NaiveDate,
    pub licenses_reset: usize,
    pub samples_pruned: usize,
}

/// Runs the monthly reset for `as_of`, then prunes expired rate samples.
pub fn sweep_once(hub: &Entitlements, as_of: NaiveDate) -> LicenseResult<SweepReport> {
    let licenses_reset = hub.run_monthly_reset(as_of)?;
    let samples_pruned = hub.prune_rate_samples()?;
    Ok(SweepReport {
        as_of,
        licenses_reset,
        samples_pruned,
    })
}

/// Sweeps every `period` until `shutdown` resolves. The first pass runs
/// immediately. Returns the number of passes that completed.
///
/// A failed pass is logged and retried on the next tick.
pub async fn run_sweeper<S>(hub: Arc<Entitlements>, period: Duration, shutdown: S) -> usize
where
    S: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut completed = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(completed, "Sweeper stopping");
                return completed;
            }
            _ = ticker.tick() => {
                match sweep_once(&hub, hub.today()) {
                    Ok(report) => {
                        completed += 1;
                        if report.licenses_reset > 0 || report.samples_pruned > 0 {
                            info!(
                                licenses_reset = report.licenses_reset,
                                samples_pruned = report.samples_pruned,
                                "Sweep complete"
                            );
                        } else {
                            debug!("Sweep complete, nothing to do");
                        }
                    }
                    Err(e) => warn!(error = %e, reason = e.reason(), "Sweep failed"),
                }
            }
        }
    }
}
