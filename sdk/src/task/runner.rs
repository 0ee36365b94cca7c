//! TaskRunner - spawns operations and supervises their outcome

use crate::config::TaskRunnerConfig;
use crate::error::{BaasError, Result};
use crate::task::callbacks::TaskCallbacks;
use crate::task::channel::progress_channel;
use crate::task::context::TaskContext;
use crate::task::handle::{TaskHandle, TaskState, TaskStatus};
use crate::task::notify::{panic_message, InlineNotifier, NotificationContext};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Runs cancellable operations on the Tokio runtime.
///
/// Cloning is cheap; clones share the concurrency bound and notification
/// context.
#[derive(Clone)]
pub struct TaskRunner {
    semaphore: Option<Arc<Semaphore>>,
    notifier: Arc<dyn NotificationContext>,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new(TaskRunnerConfig::DEFAULT)
    }
}

impl TaskRunner {
    /// Create a runner; callbacks run on the default ordered delivery task
    pub fn new(config: TaskRunnerConfig) -> Self {
        Self {
            semaphore: config
                .max_concurrent
                .map(|permits| Arc::new(Semaphore::new(permits))),
            notifier: Arc::new(InlineNotifier),
        }
    }

    /// Deliver callbacks through `notifier` instead
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationContext>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run `operation` in the background.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately.
    pub fn run<T, F, Fut>(&self, operation: F, callbacks: TaskCallbacks<T>) -> TaskHandle
    where
        T: Send + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.run_with_kind("task", operation, callbacks)
    }

    /// Same as [`TaskRunner::run`] with a kind label for logs and the handle
    pub fn run_with_kind<T, F, Fut>(
        &self,
        kind: &str,
        operation: F,
        callbacks: TaskCallbacks<T>,
    ) -> TaskHandle
    where
        T: Send + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = TaskState::new(kind);
        let handle = TaskHandle::new(Arc::clone(&state));
        let (reporter, terminal, delivery) = progress_channel::<T>(Arc::clone(&state));

        tokio::spawn(delivery.run(callbacks, Arc::clone(&self.notifier)));

        let span = tracing::info_span!("task", task_id = %state.id(), kind = %state.kind());
        let semaphore = self.semaphore.clone();
        let ctx = TaskContext::new(Arc::clone(&state), reporter);

        tokio::spawn(
            async move {
                let result = Self::supervise(&state, semaphore, ctx, operation).await;
                let status = match &result {
                    Ok(_) => TaskStatus::Completed,
                    Err(BaasError::Cancelled) => TaskStatus::Cancelled,
                    Err(_) => TaskStatus::Failed,
                };
                match &result {
                    Ok(_) => tracing::debug!("Task completed"),
                    Err(BaasError::Cancelled) => tracing::info!("Task cancelled"),
                    Err(e) => tracing::warn!(error = %e, "Task failed"),
                }
                state.finish(status);
                terminal.send(result);
            }
            .instrument(span),
        );

        handle
    }

    async fn supervise<T, F, Fut>(
        state: &Arc<TaskState>,
        semaphore: Option<Arc<Semaphore>>,
        ctx: TaskContext,
        operation: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // Waiting for a slot can be interrupted by cancellation
        let _permit = match semaphore {
            Some(semaphore) => {
                tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => return Err(BaasError::Other("task runner closed".to_string())),
                    },
                    _ = state.cancelled() => return Err(BaasError::Cancelled),
                }
            }
            None => None,
        };

        // The operation runs in its own task so a panic surfaces as a JoinError
        let joined = tokio::spawn(async move { operation(ctx).await }.in_current_span()).await;

        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic().as_ref());
                tracing::error!(panic = %message, "Task panicked");
                Err(BaasError::TaskPanicked(message))
            }
            Err(e) => Err(BaasError::Other(e.to_string())),
        };

        match result {
            // An operation that gives up after cancellation reports Cancelled
            Err(e) if state.is_cancelled() && !matches!(e, BaasError::TaskPanicked(_)) => {
                if !e.is_cancelled() {
                    tracing::debug!(error = %e, "Error after cancellation reported as cancelled");
                }
                Err(BaasError::Cancelled)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field(
                "available_permits",
                &self.semaphore.as_ref().map(|s| s.available_permits()),
            )
            .finish()
    }
}
