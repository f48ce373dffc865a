use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Channel, Message, PartyKey, TenantId, ThreadId, Timestamp};

/// All domain events that can occur in the routing engine.
///
/// Events are emitted after the owning component has committed a state change
/// and consumed by:
/// - The SSE broadcast channel (live operator dashboards)
/// - Thread observers registered by channel adapters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DomainEvent {
    /// A new thread was opened for a party.
    ThreadCreated {
        tenant_id: TenantId,
        thread_id: ThreadId,
        with: PartyKey,
        channel: Channel,
        timestamp: Timestamp,
    },

    /// A message was appended to a thread.
    MessageAppended {
        tenant_id: TenantId,
        thread_id: ThreadId,
        message_count: usize,
        message: Message,
    },

    /// A question was recorded for human review.
    QuestionEscalated {
        tenant_id: TenantId,
        question_id: Uuid,
        question: String,
        timestamp: Timestamp,
    },

    /// An agent reply was appended and handed to the webhook notifier.
    AgentMessageSent {
        tenant_id: TenantId,
        thread_id: ThreadId,
        to: PartyKey,
        timestamp: Timestamp,
    },

    /// A tenant knowledge profile was merged.
    ProfileUpdated {
        tenant_id: TenantId,
        keys: Vec<String>,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            DomainEvent::ThreadCreated { tenant_id, .. }
            | DomainEvent::MessageAppended { tenant_id, .. }
            | DomainEvent::QuestionEscalated { tenant_id, .. }
            | DomainEvent::AgentMessageSent { tenant_id, .. }
            | DomainEvent::ProfileUpdated { tenant_id, .. } => tenant_id,
        }
    }

    /// Stable name used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ThreadCreated { .. } => "thread_created",
            DomainEvent::MessageAppended { .. } => "message_appended",
            DomainEvent::QuestionEscalated { .. } => "question_escalated",
            DomainEvent::AgentMessageSent { .. } => "agent_message_sent",
            DomainEvent::ProfileUpdated { .. } => "profile_updated",
        }
    }
}

/// Payloads posted to the external webhook listener.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    #[serde(rename = "message.sent")]
    MessageSent {
        tenant: TenantId,
        to: PartyKey,
        thread_id: ThreadId,
        message: Message,
    },
}
