//! Storewatch API Server Binary
//!
//! Serves `/health` and `/run` until SIGTERM or Ctrl+C.

#![deny(unsafe_code)]

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    api::init_tracing();

    api::run_server().await
}
