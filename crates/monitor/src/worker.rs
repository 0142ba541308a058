//! Producer threads with bounded joins

use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::MonitorError;

/// Dedicated OS thread for a blocking loop.
///
/// The thread signals completion when its closure returns or unwinds, so
/// the async side can wait for it with a timeout instead of a blocking
/// `join`.
pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: oneshot::Receiver<()>,
}

struct DoneSignal(Option<oneshot::Sender<()>>);

impl Drop for DoneSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

impl Worker {
    /// Spawn a named thread running `body`
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self, MonitorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let (tx, done) = oneshot::channel();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _signal = DoneSignal(Some(tx));
                body();
            })
            .map_err(|e| MonitorError::Startup(format!("failed to spawn {name}: {e}")))?;

        Ok(Self { name, handle, done })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to `limit` for the thread to finish. A thread that does not
    /// finish in time is detached.
    pub async fn join(self, limit: Duration) -> Result<(), MonitorError> {
        let Worker { name, handle, done } = self;

        if tokio::time::timeout(limit, done).await.is_err() {
            let err = MonitorError::ShutdownTimeout {
                unit: name,
                timeout_ms: limit.as_millis() as u64,
            };
            error!("{}", err);
            return Err(err);
        }

        if handle.join().is_err() {
            warn!("{} exited by panic", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_join_finished_worker() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let worker = Worker::spawn("test-worker", move || flag.store(true, Ordering::SeqCst)).unwrap();
        assert_eq!(worker.name(), "test-worker");
        worker.join(Duration::from_secs(1)).await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_join_times_out_on_stuck_worker() {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let worker = Worker::spawn("stuck", move || {
            while !flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
        })
        .unwrap();

        let result = worker.join(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(MonitorError::ShutdownTimeout { ref unit, .. }) if unit == "stuck"));
        stop.store(true, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_panicking_worker_still_joins() {
        let worker = Worker::spawn("panics", || panic!("scorer crashed")).unwrap();
        assert!(worker.join(Duration::from_secs(1)).await.is_ok());
    }
}
