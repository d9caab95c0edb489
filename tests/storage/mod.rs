//! Shared storage integration tests.
//!
//! Tests the EventDriver contract against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod driver_tests;
