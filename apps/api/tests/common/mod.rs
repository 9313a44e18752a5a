//! Common test utilities for API integration tests
//!
//! Builds the full router over in-memory services and provides request
//! helpers for driving it with `tower::ServiceExt::oneshot`.

#![allow(unused_imports)]

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
