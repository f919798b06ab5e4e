//! Periodic cleanup of cached repositories.

use crate::error::{GatewayError, GatewayResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Something holding cached state that goes stale.
pub trait Cleanup: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Drops stale state.
    fn cleanup(&self);
}

/// Runs a [`Cleanup`] every interval, the first run one interval after
/// start.
pub struct CleanupScheduler {
    target: Arc<dyn Cleanup>,
    interval: Duration,
    running: AtomicBool,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
    loop_handle: RwLock<Option<JoinHandle<()>>>,
    runs: Arc<AtomicU64>,
}

impl CleanupScheduler {
    /// Creates a stopped scheduler.
    pub fn new(target: Arc<dyn Cleanup>, interval: Duration) -> Self {
        Self {
            target,
            interval,
            running: AtomicBool::new(false),
            shutdown_tx: RwLock::new(None),
            loop_handle: RwLock::new(None),
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check if the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of cleanups performed.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Starts the cleanup loop on the current runtime.
    pub fn start(&self) -> GatewayResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyScheduled {
                name: self.target.name().to_string(),
            });
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write() = Some(shutdown_tx);

        let target = Arc::clone(&self.target);
        let period = self.interval;
        let runs = Arc::clone(&self.runs);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!(target_name = target.name(), "Cleaning up");
                        target.cleanup();
                        runs.fetch_add(1, Ordering::Relaxed);
                    }
                    _ = shutdown_rx.recv() => {
                        debug!(target_name = target.name(), "Cleanup received shutdown signal");
                        break;
                    }
                }
            }
        });

        *self.loop_handle.write() = Some(handle);
        info!(target_name = self.target.name(), interval = ?self.interval, "Cleanup scheduled");
        Ok(())
    }

    /// Stops the cleanup loop.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let shutdown_tx = self.shutdown_tx.write().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }

        let handle = self.loop_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        info!(target_name = self.target.name(), "Cleanup stopped");
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            if let Some(tx) = self.shutdown_tx.write().take() {
                let _ = tx.try_send(());
            }
        }
    }
}
