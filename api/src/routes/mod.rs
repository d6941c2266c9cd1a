//! API route definitions.
//!
//! This module organizes all HTTP routes for the Storewatch API server.

mod health;
mod run;

pub use health::health_routes;
pub use run::{run_routes, RunFailure, RunResponse};
