//! Escalation Logger: records questions the engine could not answer.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::events::DomainEvent;
use frontdesk_core::types::{QuestionStatus, TenantId, Timestamp, UnresolvedQuestion};
use frontdesk_storage::QuestionRepository;

use crate::error::EscalationError;
use crate::events::EventBus;

/// Durable sink for unresolved questions.
pub trait QuestionStore: Send + Sync {
    fn insert(&self, question: &UnresolvedQuestion) -> Result<(), FrontdeskError>;
}

impl QuestionStore for QuestionRepository {
    fn insert(&self, question: &UnresolvedQuestion) -> Result<(), FrontdeskError> {
        QuestionRepository::insert(self, question)
    }
}

pub struct EscalationLogger {
    store: Arc<dyn QuestionStore>,
    events: Option<EventBus>,
}

impl EscalationLogger {
    pub fn new(store: Arc<dyn QuestionStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Record `question` as open for review.
    ///
    /// Retrying is safe; duplicates are kept. A storage failure is returned to
    /// the caller and never swallowed.
    pub fn log_unanswered(
        &self,
        tenant: &str,
        question: &str,
        call_id: Option<&str>,
        asked_by: Option<&str>,
    ) -> Result<UnresolvedQuestion, EscalationError> {
        let tenant_id = TenantId::parse(tenant)
            .map_err(|_| EscalationError::Validation("tenant must not be empty".to_string()))?;
        let question = question.trim();
        if question.is_empty() {
            return Err(EscalationError::Validation(
                "question must not be empty".to_string(),
            ));
        }

        let record = UnresolvedQuestion {
            id: Uuid::new_v4(),
            tenant_id,
            question: question.to_string(),
            call_id: call_id.map(str::to_string),
            asked_by: asked_by.map(str::to_string),
            status: QuestionStatus::Open,
            created_at: Timestamp::now(),
        };

        if let Err(e) = self.store.insert(&record) {
            error!(tenant = %record.tenant_id, error = %e, "Failed to record unresolved question");
            return Err(e.into());
        }

        info!(
            tenant = %record.tenant_id,
            question_id = %record.id,
            call_id = record.call_id.as_deref().unwrap_or(""),
            "Escalated unanswered question"
        );

        if let Some(events) = &self.events {
            events.publish(DomainEvent::QuestionEscalated {
                tenant_id: record.tenant_id.clone(),
                question_id: record.id,
                question: record.question.clone(),
                timestamp: record.created_at,
            });
        }

        Ok(record)
    }
}
