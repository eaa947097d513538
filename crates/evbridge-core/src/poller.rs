// ── Session polling ──
//
// Periodically re-checks every accessory's session. A tick is skipped
// whenever the command queue has work queued or running, so polls never
// pile up behind a slow user command.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::bridge::Bridge;
use crate::error::CoreError;

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The queue was busy; nothing was fetched.
    Skipped,
    /// Session checks ran for `accessories` chargers.
    Polled { accessories: usize },
}

/// Run one poll pass. Per-accessory failures are logged and leave that
/// accessory's characteristics stale; they do not fail the pass.
pub async fn poll_once(bridge: &Bridge, refresh_devices: bool) -> Result<PollOutcome, CoreError> {
    let pending = bridge.queue().pending();
    if pending > 0 {
        debug!(pending, "command queue busy, skipping poll");
        return Ok(PollOutcome::Skipped);
    }

    if refresh_devices {
        if let Err(e) = bridge.refresh_devices().await {
            warn!(error = %e, "device refresh failed");
        }
    }

    let accessories = bridge.accessories();
    let mut handles = Vec::with_capacity(accessories.len());
    for accessory in &accessories {
        handles.push((accessory.address().to_owned(), accessory.submit_session_check()?));
    }

    for (address, handle) in handles {
        match handle.wait().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(address = %address, error = %e, "session check failed"),
            Err(e) => warn!(address = %address, error = %e, "session check aborted"),
        }
    }

    bridge.record_poll();
    Ok(PollOutcome::Polled {
        accessories: accessories.len(),
    })
}

/// Device-refresh cadence. Only polls that actually ran are counted, so a
/// refresh that falls on a skipped tick happens on the next real poll.
#[derive(Debug, Clone, Copy)]
struct RefreshSchedule {
    every: u32,
    polled: u32,
}

impl RefreshSchedule {
    fn new(every: u32) -> Self {
        Self { every, polled: 0 }
    }

    fn due(&self) -> bool {
        self.every > 0 && self.polled.wrapping_add(1) % self.every == 0
    }

    fn record(&mut self, outcome: PollOutcome) {
        if let PollOutcome::Polled { .. } = outcome {
            self.polled = self.polled.wrapping_add(1);
        }
    }
}

/// Background loop: one `poll_once` per interval, with a device-list
/// refresh on every `device_refresh_every`-th completed poll (0 = never).
pub(crate) async fn poll_task(
    bridge: Bridge,
    interval: Duration,
    device_refresh_every: u32,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the immediate first tick

    let mut schedule = RefreshSchedule::new(device_refresh_every);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match poll_once(&bridge, schedule.due()).await {
                    Ok(outcome) => {
                        schedule.record(outcome);
                        trace!(?outcome, "poll tick");
                    }
                    Err(e) => warn!(error = %e, "poll failed"),
                }
            }
        }
    }
    debug!("poller stopped");
}
