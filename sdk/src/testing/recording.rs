//! Callbacks that record what a task delivered.

use crate::error::{BaasError, Result};
use crate::task::TaskCallbacks;
use baas_core::ProgressSample;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Builds [`TaskCallbacks`] wired to a [`Recorded`] log.
pub struct RecordingCallbacks;

impl RecordingCallbacks {
    pub fn create<T: Send + 'static>() -> (TaskCallbacks<T>, Recorded<T>) {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let shared = Arc::new(Shared::default());

        let recorded = Recorded {
            shared: Arc::clone(&shared),
            outcome: Mutex::new(Some(rx)),
        };

        let on_progress = Arc::clone(&shared);
        let on_result = Arc::clone(&shared);
        let on_error = Arc::clone(&shared);
        let result_tx = Arc::clone(&tx);
        let error_tx = tx;

        let callbacks = TaskCallbacks::new()
            .on_progress(move |sample| {
                if on_progress.terminal.load(Ordering::SeqCst) {
                    on_progress.late_progress.fetch_add(1, Ordering::SeqCst);
                }
                on_progress.progress.lock().push(sample);
            })
            .on_result(move |value| {
                on_result.terminal_delivered();
                if let Some(tx) = result_tx.lock().take() {
                    let _ = tx.send(Ok(value));
                }
            })
            .on_error(move |error| {
                on_error.terminal_delivered();
                if let Some(tx) = error_tx.lock().take() {
                    let _ = tx.send(Err(error));
                }
            });

        (callbacks, recorded)
    }
}

#[derive(Default)]
struct Shared {
    progress: Mutex<Vec<ProgressSample>>,
    terminal: AtomicBool,
    terminal_count: AtomicUsize,
    late_progress: AtomicUsize,
}

impl Shared {
    fn terminal_delivered(&self) {
        self.terminal.store(true, Ordering::SeqCst);
        self.terminal_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a task delivered through its callbacks.
pub struct Recorded<T> {
    shared: Arc<Shared>,
    outcome: Mutex<Option<oneshot::Receiver<Result<T>>>>,
}

impl<T> Recorded<T> {
    pub fn progress(&self) -> Vec<ProgressSample> {
        self.shared.progress.lock().clone()
    }

    /// `transferred_bytes` of each progress sample
    pub fn transferred(&self) -> Vec<u64> {
        self.shared
            .progress
            .lock()
            .iter()
            .filter_map(ProgressSample::transferred_bytes)
            .collect()
    }

    /// Number of terminal callbacks so far
    pub fn terminal_count(&self) -> usize {
        self.shared.terminal_count.load(Ordering::SeqCst)
    }

    /// Progress samples delivered after the terminal callback
    pub fn late_progress(&self) -> usize {
        self.shared.late_progress.load(Ordering::SeqCst)
    }

    /// Wait for the terminal callback. Can be awaited once.
    pub async fn outcome(&self) -> Result<T> {
        let rx = self.outcome.lock().take();
        match rx {
            Some(rx) => rx
                .await
                .map_err(|_| BaasError::Other("callbacks dropped without outcome".to_string()))?,
            None => Err(BaasError::Other("outcome already taken".to_string())),
        }
    }
}

impl<T> std::fmt::Debug for Recorded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorded")
            .field("progress", &self.shared.progress.lock().len())
            .field("terminal_count", &self.terminal_count())
            .finish()
    }
}
