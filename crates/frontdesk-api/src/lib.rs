//! Frontdesk API crate - axum HTTP surface for channel adapters and operators.
//!
//! Channel adapters post inbound deliveries; operators read threads, send
//! agent replies, curate quick answers and knowledge, review escalated
//! questions, and follow live domain events over SSE.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
