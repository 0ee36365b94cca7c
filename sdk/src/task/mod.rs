//! Cancellable tasks: background operations with progress, result and error
//! callbacks.

pub mod callbacks;
pub mod channel;
pub mod context;
pub mod handle;
pub mod notify;
pub mod runner;

pub use callbacks::{ErrorCallback, ProgressCallback, ResultCallback, TaskCallbacks};
pub use channel::ProgressReporter;
pub use context::TaskContext;
pub use handle::{TaskHandle, TaskStatus};
pub use notify::{queued, InlineNotifier, Notification, NotificationContext, NotificationQueue, QueuedNotifier};
pub use runner::TaskRunner;
