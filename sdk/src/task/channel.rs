//! Progress Channel - ordered, non-blocking delivery from a task to its callbacks
//!
//! The operation side never blocks: samples go into an unbounded queue. A
//! single delivery loop drains the queue in order and hands each callback to
//! the task's notification context. The terminal result travels through the
//! same queue, so it always follows every sample emitted before it.

use crate::error::Result;
use crate::task::callbacks::TaskCallbacks;
use crate::task::handle::TaskState;
use crate::task::notify::{run_guarded, NotificationContext};
use baas_core::ProgressSample;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sink the operation uses to emit progress
pub type ProgressReporter = Arc<dyn Fn(ProgressSample) + Send + Sync>;

enum ChannelEvent<T> {
    Progress(ProgressSample),
    Terminal(Result<T>),
}

/// Sends the single terminal result
pub(crate) struct TerminalSender<T> {
    tx: mpsc::UnboundedSender<ChannelEvent<T>>,
}

impl<T> TerminalSender<T> {
    pub(crate) fn send(self, result: Result<T>) {
        if self.tx.send(ChannelEvent::Terminal(result)).is_err() {
            tracing::warn!("Progress channel closed before the terminal result");
        }
    }
}

/// Receiving side, consumed by [`Delivery::run`]
pub(crate) struct Delivery<T> {
    state: Arc<TaskState>,
    rx: mpsc::UnboundedReceiver<ChannelEvent<T>>,
}

/// Create a channel for one task.
pub(crate) fn progress_channel<T: Send + 'static>(
    state: Arc<TaskState>,
) -> (ProgressReporter, TerminalSender<T>, Delivery<T>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let progress_tx = tx.clone();
    let progress_state = Arc::clone(&state);
    let reporter: ProgressReporter = Arc::new(move |sample| {
        if progress_state.is_cancelled() {
            return;
        }
        // A closed channel means delivery already ended
        let _ = progress_tx.send(ChannelEvent::Progress(sample));
    });

    (reporter, TerminalSender { tx }, Delivery { state, rx })
}

impl<T: Send + 'static> Delivery<T> {
    /// Deliver events until the terminal result has been dispatched.
    pub(crate) async fn run(
        mut self,
        callbacks: TaskCallbacks<T>,
        notifier: Arc<dyn NotificationContext>,
    ) {
        let TaskCallbacks {
            on_progress,
            on_result,
            on_error,
        } = callbacks;

        while let Some(event) = self.rx.recv().await {
            match event {
                ChannelEvent::Progress(sample) => {
                    if self.state.is_cancelled() {
                        tracing::trace!(task_id = %self.state.id(), "Dropping progress after cancellation");
                        continue;
                    }
                    let Some(on_progress) = on_progress.as_ref() else {
                        continue;
                    };
                    let on_progress = Arc::clone(on_progress);
                    let state = Arc::clone(&self.state);
                    notifier.dispatch(Box::new(move || {
                        // Cancellation may land between dispatch and execution
                        if !state.is_cancelled() {
                            on_progress(sample);
                        }
                    }));
                }
                ChannelEvent::Terminal(result) => {
                    match result {
                        Ok(value) => {
                            if let Some(on_result) = on_result {
                                notifier.dispatch(Box::new(move || on_result(value)));
                            }
                        }
                        Err(err) => {
                            if let Some(on_error) = on_error {
                                notifier.dispatch(Box::new(move || on_error(err)));
                            } else {
                                tracing::debug!(task_id = %self.state.id(), error = %err, "Task failed with no error callback");
                            }
                        }
                    }
                    return;
                }
            }
        }
    }
}

/// Progress reporter that discards every sample
pub(crate) fn discard_reporter() -> ProgressReporter {
    Arc::new(|_| {})
}

/// Progress reporter that invokes `f` inline, guarding against panics.
pub(crate) fn inline_reporter(f: ProgressReporter) -> ProgressReporter {
    Arc::new(move |sample| {
        let f = Arc::clone(&f);
        run_guarded(Box::new(move || f(sample)));
    })
}
