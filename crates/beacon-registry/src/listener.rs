//! Background task feeding bus events into an [`EventHandler`].

use std::sync::Arc;

use beacon_types::EventReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::EventHandler;

/// Handle to a running listener task.
///
/// Dropping the handle also stops the task, without waiting for it.
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal the task to exit. Idempotent.
    pub fn shutdown(&self) {
        // send_replace never fails, even after the task has exited.
        self.shutdown_tx.send_replace(true);
    }

    /// Signal the task to exit and wait for it.
    ///
    /// An event already being handled completes first.
    pub async fn stop(self) {
        self.shutdown();
        if let Err(e) = self.task.await {
            warn!("listener task ended abnormally: {e}");
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Spawn a task delivering every event from `events` to `handler`.
///
/// The task runs until the handle is stopped or the bus is closed. Events
/// are handled sequentially in delivery order.
pub fn start(handler: Arc<dyn EventHandler>, mut events: EventReceiver) -> ListenerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!("event listener started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("event listener shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("event bus closed");
                        break;
                    };
                    debug!(?event, "handling cluster event");
                    handler.handle_event(&event);
                }
            }
        }
        info!("event listener stopped");
    });

    ListenerHandle { shutdown_tx, task }
}
