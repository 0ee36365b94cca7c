//! Notification contexts: where task callbacks run

use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;

/// A callback invocation waiting to run on a notification context
pub type Notification = Box<dyn FnOnce() + Send + 'static>;

/// Executes task callbacks on behalf of the caller.
///
/// Implementations must run notifications in the order they are dispatched.
pub trait NotificationContext: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Runs callbacks directly on the task's ordered delivery task.
///
/// This is the default context.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineNotifier;

impl NotificationContext for InlineNotifier {
    fn dispatch(&self, notification: Notification) {
        run_guarded(notification);
    }
}

/// Hands callbacks to a [`NotificationQueue`] drained by the application,
/// e.g. from its main loop.
#[derive(Debug, Clone)]
pub struct QueuedNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationContext for QueuedNotifier {
    fn dispatch(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!("Notification queue closed, dropping callback");
        }
    }
}

/// Receiving side of a [`QueuedNotifier`]
#[derive(Debug)]
pub struct NotificationQueue {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationQueue {
    /// Run every notification that is already queued. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(notification) = self.rx.try_recv() {
            run_guarded(notification);
            count += 1;
        }
        count
    }

    /// Wait for the next notification and run it.
    ///
    /// Returns `false` once every notifier has been dropped and the queue is
    /// empty.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(notification) => {
                run_guarded(notification);
                true
            }
            None => false,
        }
    }
}

/// Create a connected notifier/queue pair
pub fn queued() -> (QueuedNotifier, NotificationQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueuedNotifier { tx }, NotificationQueue { rx })
}

/// Run a callback, logging instead of propagating a panic.
pub(crate) fn run_guarded(notification: Notification) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(notification)) {
        tracing::warn!(
            panic = %panic_message(panic.as_ref()),
            "Task callback panicked"
        );
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
