//! Liveness endpoint for hosting platforms.
//!
//! ```text
//! responder.rs: GET /health -> 200 fixed JSON, anything else -> 404
//! server.rs:    bind + serve the responder on a detached tokio task
//! ```

pub mod responder;
pub mod server;

pub use responder::{health_body, router, HEALTH_PATH};
pub use server::{start, HealthServerHandle};
