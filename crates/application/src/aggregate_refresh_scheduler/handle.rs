use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Cancellation handle for the recurring refresh task.
///
/// Dropping the handle cancels the loop as well; keep it alive for as long as
/// refreshes should run.
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshHandle {
    pub(super) fn new(shutdown: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(super) fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    pub(super) async fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().await.take()
    }
}
