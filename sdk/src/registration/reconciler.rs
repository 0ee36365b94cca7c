//! RegistrationReconciler - brings the server device record in line with the
//! local session.
//!
//! Every operation takes the reconciler's async mutex before touching the
//! store, so reconciliations of one device never overlap. A call that had to
//! wait re-reads the store once it holds the lock: if the previous call already
//! wrote what it wants, it returns [`RegistrationOutcome::AlreadyRegistered`]
//! without a network call.

use super::endpoint::{DeviceEndpoint, DeviceRegistration};
use super::store::RegistrationStore;
use super::IdentityProvider;
use crate::config::ReconcilerConfig;
use crate::error::{BaasError, Result};
use crate::task::{TaskCallbacks, TaskContext, TaskHandle, TaskRunner};
use baas_core::{
    decide, DesiredRegistration, RegisterReason, RegistrationDecision, RegistrationPhase,
    RegistrationState, TagSet,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// Session changes that require the device record to be re-checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedUp,
    SignedOut,
    /// The application no longer wants push messages on this device
    Unsubscribed,
}

/// What a reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Server record already matched, no network call was made
    AlreadyRegistered,
    /// The server record was created or updated
    Registered {
        device_id: String,
        reason: RegisterReason,
        attempts: u32,
    },
    /// The server record was deleted
    Unregistered,
    /// There was no server record to delete
    NotRegistered,
    /// No push token has been supplied yet
    NoDeviceToken,
}

/// Serialized register/unregister against a [`DeviceEndpoint`].
///
/// Cloning is cheap; clones share the lock, store and endpoint.
#[derive(Clone)]
pub struct RegistrationReconciler {
    inner: Arc<Inner>,
}

struct Inner {
    store: RegistrationStore,
    endpoint: Arc<dyn DeviceEndpoint>,
    identity: Arc<dyn IdentityProvider>,
    config: ReconcilerConfig,
    runner: TaskRunner,
    lock: AsyncMutex<()>,
    phase: Mutex<RegistrationPhase>,
}

impl RegistrationReconciler {
    pub fn new(
        store: RegistrationStore,
        endpoint: Arc<dyn DeviceEndpoint>,
        identity: Arc<dyn IdentityProvider>,
        config: ReconcilerConfig,
        runner: TaskRunner,
    ) -> Self {
        let phase = match store.load() {
            Ok(state) if state.is_registered() => RegistrationPhase::Registered,
            _ => RegistrationPhase::Unregistered,
        };
        Self {
            inner: Arc::new(Inner {
                store,
                endpoint,
                identity,
                config,
                runner,
                lock: AsyncMutex::new(()),
                phase: Mutex::new(phase),
            }),
        }
    }

    pub fn store(&self) -> &RegistrationStore {
        &self.inner.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Last known phase of the device record
    pub fn phase(&self) -> RegistrationPhase {
        *self.inner.phase.lock()
    }

    /// Register `device_token` for the signed-in user and pending tags.
    pub async fn register(
        &self,
        ctx: &TaskContext,
        device_token: &str,
    ) -> Result<RegistrationOutcome> {
        validate_token(device_token)?;
        let _guard = self.acquire(ctx).await?;
        self.reconcile_locked(ctx, Some(device_token)).await
    }

    /// Replace the requested tags and reconcile.
    pub async fn set_tags(&self, ctx: &TaskContext, tags: TagSet) -> Result<RegistrationOutcome> {
        let _guard = self.acquire(ctx).await?;
        self.inner.store.set_pending_tags(&tags)?;
        self.reconcile_locked(ctx, None).await
    }

    /// Reconcile using the stored token.
    pub async fn sync(&self, ctx: &TaskContext) -> Result<RegistrationOutcome> {
        let _guard = self.acquire(ctx).await?;
        self.reconcile_locked(ctx, None).await
    }

    /// Delete the server record, if any.
    pub async fn unregister(&self, ctx: &TaskContext) -> Result<RegistrationOutcome> {
        let _guard = self.acquire(ctx).await?;
        self.unregister_locked(ctx).await
    }

    /// React to a sign-in, sign-up, sign-out or unsubscribe.
    pub async fn on_session_event(
        &self,
        ctx: &TaskContext,
        event: SessionEvent,
    ) -> Result<RegistrationOutcome> {
        tracing::debug!(?event, "Session event");
        match event {
            SessionEvent::SignedIn | SessionEvent::SignedUp | SessionEvent::SignedOut => {
                self.sync(ctx).await
            }
            SessionEvent::Unsubscribed => self.unregister(ctx).await,
        }
    }

    /// Background [`RegistrationReconciler::register`].
    ///
    /// An empty token is rejected here, before anything is spawned.
    pub fn register_async(
        &self,
        device_token: impl Into<String>,
        callbacks: TaskCallbacks<RegistrationOutcome>,
    ) -> Result<TaskHandle> {
        let device_token = device_token.into();
        validate_token(&device_token)?;
        let this = self.clone();
        Ok(self.inner.runner.run_with_kind(
            "register",
            move |ctx| async move { this.register(&ctx, &device_token).await },
            callbacks,
        ))
    }

    /// Background [`RegistrationReconciler::set_tags`]
    pub fn set_tags_async(
        &self,
        tags: TagSet,
        callbacks: TaskCallbacks<RegistrationOutcome>,
    ) -> TaskHandle {
        let this = self.clone();
        self.inner.runner.run_with_kind(
            "set_tags",
            move |ctx| async move { this.set_tags(&ctx, tags).await },
            callbacks,
        )
    }

    /// Background [`RegistrationReconciler::unregister`]
    pub fn unregister_async(&self, callbacks: TaskCallbacks<RegistrationOutcome>) -> TaskHandle {
        let this = self.clone();
        self.inner.runner.run_with_kind(
            "unregister",
            move |ctx| async move { this.unregister(&ctx).await },
            callbacks,
        )
    }

    /// Background [`RegistrationReconciler::on_session_event`]
    pub fn on_session_event_async(
        &self,
        event: SessionEvent,
        callbacks: TaskCallbacks<RegistrationOutcome>,
    ) -> TaskHandle {
        let this = self.clone();
        self.inner.runner.run_with_kind(
            "session",
            move |ctx| async move { this.on_session_event(&ctx, event).await },
            callbacks,
        )
    }

    async fn acquire(&self, ctx: &TaskContext) -> Result<MutexGuard<'_, ()>> {
        tokio::select! {
            guard = self.inner.lock.lock() => Ok(guard),
            _ = ctx.cancelled() => Err(BaasError::Cancelled),
        }
    }

    fn set_phase(&self, next: RegistrationPhase) {
        let mut phase = self.inner.phase.lock();
        if *phase == next {
            return;
        }
        if !phase.can_transition_to(next) {
            tracing::debug!(from = ?*phase, to = ?next, "Registration phase resynchronized");
        }
        *phase = next;
    }

    /// `device_token` is kept in memory; the store only learns it once the
    /// server confirms a registration carrying it.
    async fn reconcile_locked(
        &self,
        ctx: &TaskContext,
        device_token: Option<&str>,
    ) -> Result<RegistrationOutcome> {
        ctx.check_cancellation()?;

        let state = self.inner.store.load()?;
        let mut desired =
            DesiredRegistration::from_state(&state, self.inner.identity.current_username());
        if let Some(token) = device_token {
            desired = desired.with_device_token(token);
        }
        if desired.device_token.is_empty() {
            tracing::debug!("No device token yet, skipping registration");
            return Ok(RegistrationOutcome::NoDeviceToken);
        }

        let decision = decide(&state, &desired);
        match decision {
            RegistrationDecision::AlreadyRegistered => {
                if state.device_token != desired.device_token {
                    // Confirmed earlier under registered_token
                    self.inner.store.set_device_token(&desired.device_token)?;
                }
                self.set_phase(RegistrationPhase::Registered);
                tracing::debug!(device_id = %state.device_id, "Device already registered");
                Ok(RegistrationOutcome::AlreadyRegistered)
            }
            RegistrationDecision::Register(reason) => {
                let at_rest = RegistrationPhase::at_rest(&state, decision);
                self.set_phase(at_rest);
                let result = self.write_with_retry(ctx, &state, &desired, reason).await;
                if result.is_err() {
                    self.set_phase(at_rest);
                }
                result
            }
        }
    }

    async fn write_with_retry(
        &self,
        ctx: &TaskContext,
        state: &RegistrationState,
        desired: &DesiredRegistration,
        reason: RegisterReason,
    ) -> Result<RegistrationOutcome> {
        self.set_phase(RegistrationPhase::Registering);
        tracing::info!(
            reason = %reason,
            username = %desired.username,
            tags = %desired.tags,
            "Registering device"
        );

        let registration = DeviceRegistration {
            token: desired.device_token.clone(),
            tags: desired.tags.clone(),
            platform: self.inner.config.platform.clone(),
        };
        let mut schedule = self.inner.config.retry.schedule();
        let mut attempt: u32 = 0;

        loop {
            ctx.check_cancellation()?;
            attempt += 1;

            let result = if state.device_id.is_empty() {
                self.inner.endpoint.create(&registration).await
            } else {
                self.inner.endpoint.update(&state.device_id, &registration).await
            };

            let error = match result {
                Ok(record) => {
                    self.inner.store.record_registration(
                        &desired.username,
                        &desired.tags,
                        &desired.device_token,
                        &record.id,
                    )?;
                    self.set_phase(RegistrationPhase::Registered);
                    tracing::info!(device_id = %record.id, attempt, "Device registered");
                    return Ok(RegistrationOutcome::Registered {
                        device_id: record.id,
                        reason,
                        attempts: attempt,
                    });
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::warn!(attempt, error = %error, "Device registration failed");
                return Err(error);
            }

            let Some(delay) = schedule.after_failure() else {
                tracing::error!(
                    attempts = attempt,
                    error = %error,
                    "Device registration failed after all attempts"
                );
                return Err(error);
            };

            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Device registration failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancelled() => return Err(BaasError::Cancelled),
            }
        }
    }

    async fn unregister_locked(&self, ctx: &TaskContext) -> Result<RegistrationOutcome> {
        ctx.check_cancellation()?;

        let state = self.inner.store.load()?;
        if !state.is_registered() {
            self.set_phase(RegistrationPhase::Unregistered);
            tracing::debug!("No device record to delete");
            return Ok(RegistrationOutcome::NotRegistered);
        }

        let previous = self.phase();
        self.set_phase(RegistrationPhase::Unregistering);
        tracing::info!(device_id = %state.device_id, "Unregistering device");

        match self.inner.endpoint.delete(&state.device_id).await {
            Ok(()) => {
                self.inner.store.clear_registration()?;
                self.set_phase(RegistrationPhase::Unregistered);
                tracing::info!(device_id = %state.device_id, "Device unregistered");
                Ok(RegistrationOutcome::Unregistered)
            }
            Err(e) => {
                self.set_phase(previous);
                tracing::warn!(device_id = %state.device_id, error = %e, "Device unregistration failed");
                Err(e)
            }
        }
    }
}

fn validate_token(device_token: &str) -> Result<()> {
    if device_token.trim().is_empty() {
        return Err(BaasError::InvalidInput("Missing device token".to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for RegistrationReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationReconciler")
            .field("phase", &self.phase())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
