//! # baas.io Core
//!
//! Runtime-agnostic building blocks for the baas.io client SDK.
//!
//! ## What's in Core vs SDK
//!
//! **Core** contains pure values and decisions:
//! - Progress samples reported by transfers
//! - Retry plans and the exponential backoff schedule
//! - Push registration state, tag sets and the registration decision
//!
//! **SDK** contains everything bound to the async runtime:
//! - Cancellable tasks and progress delivery
//! - File transfers over HTTP
//! - The registration store and reconciler
//!
//! ## Modules
//!
//! - [`progress`] - Progress samples
//! - [`retry`] - Retry plans and backoff
//! - [`registration`] - Registration state and comparison
//! - [`error`] - Core error types

pub mod error;
pub mod progress;
pub mod registration;
pub mod retry;

pub use error::{CoreError, CoreResult};

pub use progress::ProgressSample;

pub use retry::{calculate_backoff, BackoffSchedule, RetryPlan};

pub use registration::{
    decide, DesiredRegistration, RegisterReason, RegistrationDecision, RegistrationPhase,
    RegistrationState, TagSet,
};
