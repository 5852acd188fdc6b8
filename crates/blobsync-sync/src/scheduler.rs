//! Sync scheduler - turns periodic ticks and manual requests into runs
//!
//! The [`SyncScheduler`] owns the single background worker that executes
//! [`SyncOrchestrator`] runs. Triggers are posted to a single-slot queue:
//!
//! ```text
//! interval tick ──┐
//!                 ├──→ slot (Option<SyncTrigger>) ──→ worker ──→ orchestrator.run()
//! request_sync() ─┘
//! ```
//!
//! A trigger posted while another is pending is merged into it (the
//! expedited flag is OR-ed). A trigger posted mid-run waits in the slot and
//! runs right after. Shutdown is checked between runs only; a run in
//! progress always completes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use blobsync_core::config::SyncConfigSource;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{RunOutcome, SyncOrchestrator, SyncTrigger};

// ============================================================================
// Trigger slot
// ============================================================================

#[derive(Default)]
struct TriggerSlot {
    pending: Mutex<Option<SyncTrigger>>,
    notify: Notify,
}

impl TriggerSlot {
    fn post(&self, trigger: SyncTrigger) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = Some(match pending.take() {
            Some(existing) => existing.merge(trigger),
            None => trigger,
        });
    }

    fn take(&self) -> Option<SyncTrigger> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn peek(&self) -> Option<SyncTrigger> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle for requesting runs from outside the worker
#[derive(Clone)]
pub struct SyncTriggerHandle {
    slot: Arc<TriggerSlot>,
}

impl SyncTriggerHandle {
    /// Requests a run
    ///
    /// # Arguments
    /// * `expedited` - Bypass the auto-sync setting (manual "sync now")
    pub fn request_sync(&self, expedited: bool) {
        info!(expedited, "Sync requested");
        self.slot.post(SyncTrigger { expedited });
        self.slot.notify.notify_one();
    }

    /// The trigger waiting to run, if any
    pub fn pending(&self) -> Option<SyncTrigger> {
        self.slot.peek()
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Background worker executing orchestrator runs one at a time
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    source: Arc<dyn SyncConfigSource>,
    period: Duration,
    slot: Arc<TriggerSlot>,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `orchestrator` - Executes each run
    /// * `source` - Supplies a fresh configuration snapshot per trigger
    /// * `period` - Interval between periodic triggers
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        source: Arc<dyn SyncConfigSource>,
        period: Duration,
    ) -> Self {
        info!(period_secs = period.as_secs(), "Creating sync scheduler");
        Self {
            orchestrator,
            source,
            period,
            slot: Arc::new(TriggerSlot::default()),
        }
    }

    /// Returns a handle for posting manual triggers
    pub fn handle(&self) -> SyncTriggerHandle {
        SyncTriggerHandle {
            slot: self.slot.clone(),
        }
    }

    /// Main worker loop
    ///
    /// Waits on three sources via `tokio::select!`:
    ///
    /// 1. **Shutdown**: exits when `shutdown` is cancelled
    /// 2. **Interval**: posts a periodic trigger; the first tick fires
    ///    immediately
    /// 3. **Notify**: wakes for triggers posted through a [`SyncTriggerHandle`]
    ///
    /// After each wake-up, drains the slot, running one trigger at a time.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Sync scheduler starting");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Periodic trigger");
                    self.slot.post(SyncTrigger::periodic());
                }
                _ = self.slot.notify.notified() => {}
            }

            while let Some(trigger) = self.slot.take() {
                let outcome = self
                    .orchestrator
                    .run_with_source(trigger, self.source.as_ref())
                    .await;
                match &outcome {
                    RunOutcome::Disabled => debug!("Run skipped: auto sync disabled"),
                    other => debug!(status = ?other.status_message(), "Run finished"),
                }
                if shutdown.is_cancelled() {
                    break;
                }
            }
        }

        info!("Sync scheduler stopped");
    }
}

// ============================================================================
// Unit tests
// ============================================================================
