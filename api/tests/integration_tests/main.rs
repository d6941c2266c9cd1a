//! Integration tests for the Storewatch API.
//!
//! These tests drive the full router over in-memory monitoring and sink
//! backends; nothing leaves the process.

mod common;
mod health_tests;
mod run_tests;
