//! Process-scoped setup for node binaries.
//!
//! The client is single-task, so a current-thread runtime is all a node
//! needs. Build it once in `main` and drive the request loop on it.

use tokio::runtime::{Builder, Runtime};

/// Build the runtime a node process runs on.
pub fn build_runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}
