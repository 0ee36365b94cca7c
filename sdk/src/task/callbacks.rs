//! Callbacks delivered for a task

use crate::error::BaasError;
use baas_core::ProgressSample;
use std::sync::Arc;

/// Progress callback; shared because it fires many times
pub type ProgressCallback = Arc<dyn Fn(ProgressSample) + Send + Sync>;

/// Success callback
pub type ResultCallback<T> = Box<dyn FnOnce(T) + Send>;

/// Failure callback
pub type ErrorCallback = Box<dyn FnOnce(BaasError) + Send>;

/// Callbacks for one task.
///
/// Zero or more `on_progress` calls are followed by exactly one of
/// `on_result` or `on_error`. Any callback may be left unset.
pub struct TaskCallbacks<T> {
    /// Called for each progress sample, in order
    pub on_progress: Option<ProgressCallback>,
    /// Called once with the operation's value
    pub on_result: Option<ResultCallback<T>>,
    /// Called once with the operation's error
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for TaskCallbacks<T> {
    fn default() -> Self {
        Self {
            on_progress: None,
            on_result: None,
            on_error: None,
        }
    }
}

impl<T> TaskCallbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl Fn(ProgressSample) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_result(mut self, f: impl FnOnce(T) + Send + 'static) -> Self {
        self.on_result = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(BaasError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl<T> std::fmt::Debug for TaskCallbacks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_result", &self.on_result.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
