//! Error types for the routing engine.

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::types::{TenantId, ThreadId};

/// Errors from the Thread Store.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("invalid inbound message: {0}")]
    Validation(String),
    #[error("thread not found: {tenant}/{thread_id}")]
    NotFound { tenant: TenantId, thread_id: ThreadId },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<FrontdeskError> for ThreadError {
    fn from(err: FrontdeskError) -> Self {
        match err {
            FrontdeskError::Validation(msg) => ThreadError::Validation(msg),
            other => ThreadError::Storage(other.to_string()),
        }
    }
}

/// Errors from the Retrieval Router.
///
/// "No matches" is not an error; it is an empty answer set.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("search unavailable: {0}")]
    Unavailable(String),
    #[error("search timed out after {0} ms")]
    TimedOut(u64),
}

impl From<FrontdeskError> for RetrievalError {
    fn from(err: FrontdeskError) -> Self {
        RetrievalError::Unavailable(err.to_string())
    }
}

/// Errors from the Escalation Logger.
#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("failed to record unresolved question: {0}")]
    Storage(#[from] FrontdeskError),
}

/// Errors from webhook delivery. Never propagated past the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("webhook transport failed: {0}")]
    Transport(String),
    #[error("webhook rejected event with status {status}")]
    Rejected { status: u16 },
}

/// Errors from the receptionist pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ReceptionistError {
    #[error(transparent)]
    Thread(#[from] ThreadError),
    #[error(transparent)]
    Escalation(#[from] EscalationError),
}
