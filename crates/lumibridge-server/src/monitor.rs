//! Monitor tap.
//!
//! The observer side of the accumulator's non-blocking side channel.
//! Observers (the inspection GUI collaborator, or the daemon's trace
//! logger) read per-universe snapshots of what went in and what went out;
//! the realtime path publishes best-effort and drops on overflow, so a
//! slow observer only ever costs itself.

use tokio::sync::mpsc;

pub use lumibridge_core::MonitorSnapshot;

/// Receiver half of the monitor tap, handed to observers.
///
/// Snapshots are owned values; consumers can keep or mutate them without
/// touching pipeline state. The tap is created once by
/// [`crate::ConfigManager::new`] and survives pipeline restarts — every
/// incarnation publishes into the same channel.
pub struct MonitorTap {
    rx: mpsc::Receiver<MonitorSnapshot>,
}

impl MonitorTap {
    pub(crate) fn new(rx: mpsc::Receiver<MonitorSnapshot>) -> Self {
        Self { rx }
    }

    /// Next snapshot, or `None` once the supervisor and every pipeline
    /// incarnation are gone.
    pub async fn recv(&mut self) -> Option<MonitorSnapshot> {
        self.rx.recv().await
    }
}
