//! Per-modality snapshot queues

use dms::{Modality, ModalitySnapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Bounded FIFO for one modality. The sender never blocks: a full queue
/// drops the incoming snapshot.
pub fn snapshot_queue(
    modality: Modality,
    capacity: usize,
) -> (SnapshotSender, mpsc::Receiver<ModalitySnapshot>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = SnapshotSender {
        modality,
        tx,
        dropped: Arc::new(AtomicUsize::new(0)),
    };
    (sender, rx)
}

/// Producer side of a snapshot queue
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    modality: Modality,
    tx: mpsc::Sender<ModalitySnapshot>,
    dropped: Arc<AtomicUsize>,
}

impl SnapshotSender {
    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Enqueue without blocking. Returns false if the snapshot was dropped.
    pub fn offer(&self, snapshot: ModalitySnapshot) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("dms_queue_dropped_total", "modality" => self.modality.as_str())
                    .increment(1);
                debug!("{} queue full, dropping newest snapshot", self.modality);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Snapshots dropped on a full queue
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared drop counter
    pub fn drop_counter(&self) -> Arc<AtomicUsize> {
        self.dropped.clone()
    }
}
