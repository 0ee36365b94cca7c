//! Property-based tests for baas-sdk
//!
//! These tests use proptest to check invariants over generated inputs:
//! progress ordering of chunked transfers, tag-set encoding and the backoff
//! schedule.

mod backoff_props;
mod tag_props;
mod transfer_props;
