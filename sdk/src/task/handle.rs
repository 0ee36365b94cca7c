//! TaskHandle - identity, cancellation flag and terminal status of one task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Operation still running
    Running,
    /// Operation returned a value
    Completed,
    /// Operation returned an error
    Failed,
    /// Operation stopped after cancellation
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// State shared between a task's handle, its context and the runner.
pub(crate) struct TaskState {
    id: Uuid,
    kind: String,
    cancelled: AtomicBool,
    cancel_notify: Notify,
    status: watch::Sender<TaskStatus>,
}

impl TaskState {
    pub(crate) fn new(kind: impl Into<String>) -> Arc<Self> {
        let (status, _) = watch::channel(TaskStatus::Running);
        Arc::new(Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            cancelled: AtomicBool::new(false),
            cancel_notify: Notify::new(),
            status,
        })
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn kind(&self) -> &str {
        &self.kind
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn status(&self) -> TaskStatus {
        *self.status.borrow()
    }

    /// Set the cancellation flag unless the task already finished.
    pub(crate) fn cancel(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.cancel_notify.notify_waiters();
        }
        first
    }

    /// Resolves once the cancellation flag is set.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.cancel_notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Record the terminal status. Only the first call has an effect.
    pub(crate) fn finish(&self, terminal: TaskStatus) -> bool {
        debug_assert!(terminal.is_terminal());
        self.status.send_if_modified(|current| {
            if current.is_terminal() {
                false
            } else {
                *current = terminal;
                true
            }
        })
    }

    pub(crate) async fn wait(&self) -> TaskStatus {
        let mut rx = self.status.subscribe();
        // Bound before returning: the watch::Ref borrows `rx`
        let status = match rx.wait_for(TaskStatus::is_terminal).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }
}

/// Handle to a running task.
///
/// Cloning is cheap; every clone refers to the same task. Cancellation is
/// cooperative: the operation notices the flag at its next chunk or attempt
/// boundary. Dropping all handles does not stop the task.
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
}

impl TaskHandle {
    pub(crate) fn new(state: Arc<TaskState>) -> Self {
        Self { state }
    }

    /// Unique id of this task
    pub fn id(&self) -> Uuid {
        self.state.id()
    }

    /// Kind label given when the task was started
    pub fn kind(&self) -> &str {
        self.state.kind()
    }

    /// Request cancellation.
    ///
    /// Returns `true` if this call set the flag. Calling it after the task
    /// finished, or a second time, does nothing.
    pub fn cancel(&self) -> bool {
        let set = self.state.cancel();
        if set {
            tracing::debug!(task_id = %self.id(), kind = %self.kind(), "Cancellation requested");
        }
        set
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Wait for the terminal status.
    ///
    /// This resolves when the operation ends; callbacks may still be in
    /// flight on the notification context.
    pub async fn wait(&self) -> TaskStatus {
        self.state.wait().await
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("cancelled", &self.is_cancelled())
            .field("status", &self.status())
            .finish()
    }
}
