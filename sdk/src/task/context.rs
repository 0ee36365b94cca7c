//! TaskContext - what a running operation sees of its task

use crate::error::{BaasError, Result};
use crate::task::channel::{discard_reporter, inline_reporter, ProgressReporter};
use crate::task::handle::{TaskHandle, TaskState};
use baas_core::ProgressSample;
use std::sync::Arc;
use uuid::Uuid;

/// Context for an operation running as a task: progress emission and
/// cancellation checks.
#[derive(Clone)]
pub struct TaskContext {
    state: Arc<TaskState>,
    reporter: ProgressReporter,
}

impl TaskContext {
    pub(crate) fn new(state: Arc<TaskState>, reporter: ProgressReporter) -> Self {
        Self { state, reporter }
    }

    /// A context not attached to any runner. Progress is discarded.
    ///
    /// Useful for awaiting an operation directly; cancel it through
    /// [`TaskContext::handle`].
    pub fn detached(kind: impl Into<String>) -> Self {
        Self::new(TaskState::new(kind), discard_reporter())
    }

    /// A detached context whose progress is passed to `on_progress` inline.
    pub fn with_progress(
        kind: impl Into<String>,
        on_progress: impl Fn(ProgressSample) + Send + Sync + 'static,
    ) -> Self {
        Self::new(TaskState::new(kind), inline_reporter(Arc::new(on_progress)))
    }

    /// Unique id of the task
    pub fn task_id(&self) -> Uuid {
        self.state.id()
    }

    pub fn kind(&self) -> &str {
        self.state.kind()
    }

    /// A handle to this task, e.g. to cancel it from elsewhere
    pub fn handle(&self) -> TaskHandle {
        TaskHandle::new(Arc::clone(&self.state))
    }

    /// Emit a progress sample. Dropped once the task is cancelled.
    pub fn emit(&self, sample: ProgressSample) {
        if self.state.is_cancelled() {
            return;
        }
        (self.reporter)(sample);
    }

    /// Emit a byte-count sample.
    ///
    /// Fails if `transferred` exceeds a known `total`.
    pub fn report_bytes(&self, total: Option<u64>, transferred: u64) -> Result<()> {
        let sample = ProgressSample::with_total(total, transferred)?;
        self.emit(sample);
        Ok(())
    }

    /// Check if the task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Check for cancellation and return error if cancelled
    pub fn check_cancellation(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(BaasError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the task is cancelled.
    ///
    /// Intended for `tokio::select!` against sleeps or slow I/O.
    pub async fn cancelled(&self) {
        self.state.cancelled().await
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id())
            .field("kind", &self.kind())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
