//! Status reporting port (driven/secondary port)
//!
//! The orchestrator pushes short status strings and the last-success time
//! through [`IStatusReporter`]. External observers (a CLI, a UI) read the
//! latest values or subscribe for change notifications.
//!
//! ## Design Notes
//!
//! - Only the latest message and the latest success time are retained.
//! - Observers are notified synchronously after each update, in subscription
//!   order. A [`StatusSubscription`] unsubscribes when dropped.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value reported before any status or success has been recorded.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// The two values a status reporter retains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Most recent status message
    pub last_sync_status: String,
    /// Formatted time of the most recent successful run
    pub last_success: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            last_sync_status: UNKNOWN_STATUS.to_string(),
            last_success: UNKNOWN_STATUS.to_string(),
        }
    }
}

/// Receives status change notifications
pub trait IStatusObserver: Send + Sync {
    /// Called after the status or the last-success time changed
    fn on_status_changed(&self, snapshot: &StatusSnapshot);
}

/// Handle returned by [`IStatusReporter::subscribe`]
///
/// Dropping the handle removes the observer.
pub struct StatusSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusSubscription {
    /// Creates a subscription that runs `cancel` when dropped
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Keeps the observer registered for the life of the reporter
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Port trait for recording and observing sync status
pub trait IStatusReporter: Send + Sync {
    /// Replaces the last status message
    fn update_status(&self, message: &str);

    /// Records a successful run completed at `at`
    fn record_success(&self, at: DateTime<Utc>);

    /// Latest status message, or `"Unknown"`
    fn last_status(&self) -> String;

    /// Latest success time, or `"Unknown"`
    fn last_success_time(&self) -> String;

    /// Both values at once
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            last_sync_status: self.last_status(),
            last_success: self.last_success_time(),
        }
    }

    /// Registers `observer` until the returned subscription is dropped
    fn subscribe(&self, observer: Arc<dyn IStatusObserver>) -> StatusSubscription;
}
