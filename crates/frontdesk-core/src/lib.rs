pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::FrontdeskConfig;
pub use error::{FrontdeskError, Result};
pub use events::{DomainEvent, WebhookEvent};
pub use types::*;
