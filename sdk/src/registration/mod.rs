//! Push registration
//!
//! Keeps the server's device record in line with the signed-in user, the
//! requested tags and the current push token:
//!
//! - [`RegistrationStore`] persists what was last confirmed by the server.
//! - [`DeviceEndpoint`] creates, updates and deletes the server record.
//! - [`RegistrationReconciler`] compares the two and writes when they differ,
//!   retrying transient failures with exponential backoff.

mod endpoint;
mod reconciler;
mod store;

pub use endpoint::{
    DeviceEndpoint, DeviceRecord, DeviceRegistration, HttpDeviceEndpoint, DEFAULT_PLATFORM,
};
pub use reconciler::{RegistrationOutcome, RegistrationReconciler, SessionEvent};
pub use store::{
    JsonFileStore, KeyValueStore, MemoryStore, RegistrationStore, DEVICE_ID_KEY,
    DEVICE_TOKEN_KEY, PENDING_TAGS_KEY, REGISTERED_TAGS_KEY, REGISTERED_TOKEN_KEY, USERNAME_KEY,
};

use parking_lot::RwLock;
use std::sync::Arc;

/// Source of the signed-in username. An empty string means anonymous.
pub trait IdentityProvider: Send + Sync {
    fn current_username(&self) -> String;
}

/// Username that changes as the application signs users in and out
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity(Arc<RwLock<String>>);

impl SharedIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(username.into())))
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, username: impl Into<String>) {
        *self.0.write() = username.into();
    }

    pub fn sign_out(&self) {
        self.0.write().clear();
    }
}

impl IdentityProvider for SharedIdentity {
    fn current_username(&self) -> String {
        self.0.read().clone()
    }
}
