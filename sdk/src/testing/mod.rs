//! Test doubles for SDK consumers.
//!
//! Enabled with the `testing` feature:
//!
//! - [`MockHttpExecutor`] - scripted responses, records every request
//! - [`MockDeviceEndpoint`] - in-memory device records with injectable failures
//! - [`RecordingCallbacks`] - captures progress and the terminal outcome of a task

mod mock_endpoint;
mod mock_http;
mod recording;

pub use mock_endpoint::{EndpointCall, EndpointOp, MockDeviceEndpoint};
pub use mock_http::{MockHttpExecutor, MockResponse, RecordedRequest};
pub use recording::{Recorded, RecordingCallbacks};
