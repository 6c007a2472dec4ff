//! Background push loop
//!
//! One task per engine owns both timers:
//! - the push deadline, re-armed by every local change (debounce)
//! - the retry deadline, armed after a failed push
//!
//! Because only this task pushes on its own schedule, pushes never overlap.

use crate::engine::{FlushOutcome, Shared};
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn retry_after(shared: &Shared, outcome: &FlushOutcome) -> Option<Instant> {
    match outcome {
        FlushOutcome::Failed(_) => {
            let delay = shared.config.retry_for(shared.connectivity());
            debug!(delay = ?delay, "retry scheduled");
            Some(Instant::now() + delay)
        }
        FlushOutcome::Idle | FlushOutcome::Synced | FlushOutcome::Held => None,
    }
}

pub(crate) async fn run(shared: Arc<Shared>) {
    let mut push_at: Option<Instant> = None;
    let mut retry_at: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            () = shared.stop.notified() => break,

            () = shared.kick.notified() => {
                let delay = shared.config.debounce_for(shared.connectivity());
                push_at = Some(Instant::now() + delay);
                debug!(delay = ?delay, "push scheduled");
            }

            () = wait_until(push_at) => {
                push_at = None;
                let outcome = shared.flush().await;
                retry_at = retry_after(&shared, &outcome);
            }

            () = wait_until(retry_at) => {
                retry_at = None;
                if !shared.snapshot().pending_write {
                    continue;
                }
                let report = shared.probe.probe().await;
                shared.set_connectivity(&report);
                retry_at = if report.status.is_healthy() {
                    let outcome = shared.flush().await;
                    retry_after(&shared, &outcome)
                } else {
                    debug!(status = %report.status, "remote still unavailable");
                    Some(Instant::now() + shared.config.retry_for(report.status))
                };
            }
        }
    }

    debug!("sync worker exiting");
}
