//! Sync status tracking
//!
//! Each collection owns a [`StatusTracker`]; the application combines the
//! per-collection reports into one indicator with [`StatusReport::worst`].
//!
//! ## Transitions
//!
//! - `idle` while no identity is signed in
//! - `syncing` as soon as a remote operation is issued
//! - `synced` once every issued operation has completed successfully
//! - `error` on any remote failure; the cause is retained and only a later
//!   successful remote operation leaves this state

use std::fmt;

use tokio::sync::watch;
use tracing::debug;

use crate::SyncError;

/// User-facing sync state of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    /// Rank used when combining collections: `error` > `syncing` > `synced` > `idle`
    fn severity(self) -> u8 {
        match self {
            SyncStatus::Idle => 0,
            SyncStatus::Synced => 1,
            SyncStatus::Syncing => 2,
            SyncStatus::Error => 3,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error)
    }

    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Status plus the cause of the last failure, if the status is `error`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReport {
    pub status: SyncStatus,
    pub error: Option<SyncError>,
}

impl StatusReport {
    /// Combines two reports into the more severe one
    ///
    /// On equal severity the first report wins, so its cause is kept.
    pub fn worst(self, other: StatusReport) -> StatusReport {
        if other.status.severity() > self.status.severity() {
            other
        } else {
            self
        }
    }
}

/// State machine behind a collection's [`StatusReport`]
///
/// Counts in-flight remote operations so that `synced` is only reported once
/// all of them have completed.
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<StatusReport>,
    in_flight: usize,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusReport::default());
        Self { tx, in_flight: 0 }
    }

    /// Current report
    pub fn current(&self) -> StatusReport {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.tx.subscribe()
    }

    /// Number of issued but not yet completed remote operations
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// A remote operation has been issued
    pub fn begin(&mut self) {
        self.in_flight += 1;
        self.update(|report| {
            if !report.status.is_error() {
                report.status = SyncStatus::Syncing;
            }
        });
    }

    /// An issued remote operation has completed
    pub fn finish(&mut self, result: Result<(), SyncError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result {
            Ok(()) => self.succeed(),
            Err(err) => self.fail(err),
        }
    }

    /// A snapshot has been processed
    ///
    /// Does not clear `error`: a snapshot says nothing about whether the
    /// failed operation has since reached the remote store.
    pub fn snapshot_processed(&mut self) {
        let settled = self.settled_status();
        self.update(|report| {
            if !report.status.is_error() {
                report.status = settled;
            }
        });
    }

    /// A failure outside of a tracked operation (e.g. a broken subscription)
    pub fn fail(&mut self, err: SyncError) {
        self.update(|report| {
            report.status = SyncStatus::Error;
            report.error = Some(err);
        });
    }

    /// Back to `idle`, forgetting in-flight operations and the last cause
    pub fn reset(&mut self) {
        self.in_flight = 0;
        self.update(|report| *report = StatusReport::default());
    }

    fn succeed(&mut self) {
        let settled = self.settled_status();
        self.update(|report| {
            report.status = settled;
            report.error = None;
        });
    }

    fn settled_status(&self) -> SyncStatus {
        if self.in_flight > 0 {
            SyncStatus::Syncing
        } else {
            SyncStatus::Synced
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut StatusReport)) {
        self.tx.send_if_modified(|report| {
            let before = report.clone();
            f(report);
            if *report != before {
                debug!(from = %before.status, to = %report.status, "Sync status changed");
                true
            } else {
                false
            }
        });
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
