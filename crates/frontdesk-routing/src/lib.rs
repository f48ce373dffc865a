//! Conversation routing and retrieval engine.
//!
//! Ingests channel deliveries into per-party threads, answers questions from
//! cached quick answers or semantic search, escalates what it cannot answer,
//! and dispatches agent replies with best-effort webhook notification.

pub mod dispatcher;
pub mod error;
pub mod escalation;
pub mod events;
pub mod notifier;
pub mod profile;
pub mod receptionist;
pub mod retrieval;
pub mod thread_store;

pub use dispatcher::{Dispatched, OutboundDispatcher};
pub use error::{
    EscalationError, NotificationError, ReceptionistError, RetrievalError, ThreadError,
};
pub use escalation::{EscalationLogger, QuestionStore};
pub use events::EventBus;
pub use notifier::{HttpWebhookNotifier, NoopNotifier, WebhookNotifier};
pub use profile::{suggest_profile_updates, ProfileMerger, ProfileStore};
pub use receptionist::{InboundOutcome, Receptionist};
pub use retrieval::{QuickAnswerCache, RetrievalRouter, SemanticIndex};
pub use thread_store::{ThreadJournal, ThreadObserver, ThreadStore};
