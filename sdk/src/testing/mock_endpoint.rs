//! In-memory device endpoint.

use crate::error::{BaasError, Result};
use crate::registration::{DeviceEndpoint, DeviceRecord, DeviceRegistration};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Which endpoint operation was called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointOp {
    Create,
    Update,
    Delete,
}

/// A recorded endpoint call
#[derive(Debug, Clone)]
pub struct EndpointCall {
    pub op: EndpointOp,
    pub device_id: Option<String>,
    pub registration: Option<DeviceRegistration>,
    /// When the call started (Tokio clock, so paused time is respected)
    pub at: Instant,
}

/// [`DeviceEndpoint`] that assigns `device-1`, `device-2`, ... and fails on
/// demand.
///
/// # Example
///
/// ```ignore
/// let endpoint = MockDeviceEndpoint::new();
/// endpoint.fail_times(2);
///
/// // ... run a registration ...
///
/// assert_eq!(endpoint.calls().len(), 3);
/// ```
#[derive(Clone, Default)]
pub struct MockDeviceEndpoint {
    inner: Arc<EndpointInner>,
}

#[derive(Default)]
struct EndpointInner {
    calls: RwLock<Vec<EndpointCall>>,
    failures: Mutex<VecDeque<BaasError>>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockDeviceEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call takes `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock() = Some(delay);
        self
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_times(&self, n: usize) {
        let mut failures = self.inner.failures.lock();
        for _ in 0..n {
            failures.push_back(BaasError::Transport("simulated network failure".to_string()));
        }
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: BaasError) {
        self.inner.failures.lock().push_back(error);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<EndpointCall> {
        self.inner.calls.read().clone()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call(
        &self,
        op: EndpointOp,
        device_id: Option<&str>,
        registration: Option<&DeviceRegistration>,
    ) -> Result<()> {
        self.inner.calls.write().push(EndpointCall {
            op,
            device_id: device_id.map(str::to_string),
            registration: registration.cloned(),
            at: Instant::now(),
        });

        let running = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.inner.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceEndpoint for MockDeviceEndpoint {
    async fn create(&self, registration: &DeviceRegistration) -> Result<DeviceRecord> {
        self.call(EndpointOp::Create, None, Some(registration)).await?;
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DeviceRecord {
            id: format!("device-{n}"),
        })
    }

    async fn update(
        &self,
        device_id: &str,
        registration: &DeviceRegistration,
    ) -> Result<DeviceRecord> {
        self.call(EndpointOp::Update, Some(device_id), Some(registration))
            .await?;
        Ok(DeviceRecord {
            id: device_id.to_string(),
        })
    }

    async fn delete(&self, device_id: &str) -> Result<()> {
        self.call(EndpointOp::Delete, Some(device_id), None).await
    }
}

impl std::fmt::Debug for MockDeviceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDeviceEndpoint")
            .field("calls", &self.inner.calls.read().len())
            .finish()
    }
}
