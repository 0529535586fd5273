use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::core::Manager;

/// Handle to the background GC task started by [`Manager::spawn_gc`].
///
/// Dropping the handle also stops the task, at its next wake-up.
#[derive(Debug)]
pub struct GcHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GcHandle {
    /// Signal the task to stop and wait until it has.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Session GC task ended abnormally: {}", e);
        }
        tracing::info!("Session GC stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Manager {
    /// Sweep expired sessions now and then again every GC interval, until
    /// the returned handle is shut down or dropped.
    ///
    /// A failed sweep is logged and the next one is still scheduled.
    pub fn spawn_gc(self: &Arc<Self>) -> GcHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let manager = Arc::clone(self);

        let task = tokio::spawn(async move {
            tracing::info!(
                "Session GC running every {}s",
                manager.gc_interval.as_secs_f64()
            );
            loop {
                if let Err(e) = manager.run_gc_once().await {
                    tracing::error!("Session GC sweep failed: {}", e);
                }

                tokio::select! {
                    _ = tokio::time::sleep(manager.gc_interval) => {}
                    // Fires on shutdown() and when the handle is dropped
                    _ = stop.changed() => break,
                }
            }
        });

        GcHandle { shutdown, task }
    }
}
