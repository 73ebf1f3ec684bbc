//! OpenMemory HTTP service
//!
//! Axum router over the core engine. Exposed as a library so the e2e suite
//! can drive the exact request surface the binary serves.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
