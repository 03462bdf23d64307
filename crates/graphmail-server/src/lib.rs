//! HTTP API for GraphMail
//!
//! Exposes the login flow, token status, sending and retrieval over axum.

mod error;
mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{router, AppState};
