//! baas.io SDK for Rust
//!
//! This SDK runs the long-lived client operations of a baas.io application
//! off the caller's thread: streamed file uploads and downloads with progress
//! and cancellation, and push device registration that keeps the server
//! record in line with the signed-in user, retrying transient failures.

#![allow(clippy::result_large_err)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod registration;
pub mod task;
pub mod transfer;

/// Test doubles for transports, endpoints and callbacks.
/// Available only with the `testing` feature enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use error::{BaasError, ErrorKind, Result};

// Re-export core types
pub use baas_core::{
    BackoffSchedule, ProgressSample, RegisterReason, RegistrationDecision, RegistrationPhase,
    RegistrationState, RetryPlan, TagSet,
};

// Re-export config types
pub use config::{
    ChunkSize, ClientConfig, ConfigError, ReconcilerConfig, TaskRunnerConfig, TransferConfig,
    MIN_BUFFER_SIZE,
};

// Re-export client types
pub use client::{BaasClient, BaasClientBuilder};

// Re-export task types
pub use task::{
    InlineNotifier, NotificationContext, NotificationQueue, QueuedNotifier, TaskCallbacks,
    TaskContext, TaskHandle, TaskRunner, TaskStatus,
};

// Re-export HTTP types
pub use http::{
    HttpExecutor, HttpRequest, HttpResponse, Method, ReqwestExecutor, RequestBody, SharedToken,
    StaticToken, TokenProvider,
};

// Re-export transfer types
pub use transfer::{
    DownloadRequest, DownloadedFile, TransferResponse, Transfers, UpdateRequest, UploadRequest,
};

// Re-export registration types
pub use registration::{
    DeviceEndpoint, DeviceRecord, DeviceRegistration, HttpDeviceEndpoint, IdentityProvider,
    JsonFileStore, KeyValueStore, MemoryStore, RegistrationOutcome, RegistrationReconciler,
    RegistrationStore, SessionEvent, SharedIdentity,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{BaasClient, BaasClientBuilder};
    pub use crate::config::{
        ChunkSize, ClientConfig, ReconcilerConfig, TaskRunnerConfig, TransferConfig,
    };
    pub use crate::error::{BaasError, ErrorKind, Result};
    pub use crate::http::{HttpExecutor, SharedToken, StaticToken, TokenProvider};
    pub use crate::registration::{
        IdentityProvider, RegistrationOutcome, RegistrationReconciler, SessionEvent,
        SharedIdentity,
    };
    pub use crate::task::{TaskCallbacks, TaskContext, TaskHandle, TaskRunner, TaskStatus};
    pub use crate::transfer::{
        DownloadRequest, DownloadedFile, TransferResponse, UpdateRequest, UploadRequest,
    };
    pub use baas_core::{ProgressSample, RetryPlan, TagSet};
}
