//! The inbound pipeline: ingest, answer, escalate, reply.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use frontdesk_core::config::RoutingConfig;
use frontdesk_core::types::{
    AnswerSet, InboundMessage, RetrievalAnswer, RetrievalSource, TenantId, Thread,
    UnresolvedQuestion,
};

use crate::dispatcher::OutboundDispatcher;
use crate::error::ReceptionistError;
use crate::escalation::EscalationLogger;
use crate::retrieval::RetrievalRouter;
use crate::thread_store::ThreadStore;

/// What happened to one inbound delivery.
#[derive(Debug, Clone, Serialize)]
pub struct InboundOutcome {
    /// Latest thread snapshot, including any reply.
    pub thread: Thread,
    pub reply: Option<String>,
    /// Retrieval tier that produced the reply; `None` for the fallback reply.
    pub source: Option<RetrievalSource>,
    pub escalated: Option<UnresolvedQuestion>,
}

pub struct Receptionist {
    threads: Arc<ThreadStore>,
    router: Arc<RetrievalRouter>,
    escalation: Arc<EscalationLogger>,
    dispatcher: Arc<OutboundDispatcher>,
    config: RoutingConfig,
}

impl Receptionist {
    pub fn new(
        threads: Arc<ThreadStore>,
        router: Arc<RetrievalRouter>,
        escalation: Arc<EscalationLogger>,
        dispatcher: Arc<OutboundDispatcher>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            threads,
            router,
            escalation,
            dispatcher,
            config,
        }
    }

    /// Ingest a delivery and, when auto-reply is on, answer it.
    ///
    /// A failed or empty retrieval escalates the question and replies with the
    /// fallback text. Escalation storage failures are returned; notification
    /// failures are not.
    pub async fn handle_inbound(
        &self,
        tenant: &TenantId,
        inbound: &InboundMessage,
    ) -> Result<InboundOutcome, ReceptionistError> {
        let thread = self.threads.ingest(tenant, inbound)?;
        let question = inbound.text.trim();

        if !self.config.auto_reply || question.is_empty() {
            return Ok(InboundOutcome {
                thread,
                reply: None,
                source: None,
                escalated: None,
            });
        }

        let (reply, source, escalated) = match self.router.answer(tenant, question, None).await {
            Ok(answers) => match self.confident(&answers) {
                Some(best) => (best.content.clone(), Some(best.source), None),
                None => {
                    let record = self.escalate(tenant, &thread, question)?;
                    (self.config.fallback_reply.clone(), None, Some(record))
                }
            },
            Err(e) => {
                warn!(tenant = %tenant, thread_id = %thread.id, error = %e, "Retrieval failed, escalating");
                let record = self.escalate(tenant, &thread, question)?;
                (self.config.fallback_reply.clone(), None, Some(record))
            }
        };

        let thread = match self.dispatcher.send_agent_message(Some(&thread), &reply)? {
            Some(dispatched) => dispatched.thread,
            None => thread,
        };

        Ok(InboundOutcome {
            thread,
            reply: Some(reply),
            source,
            escalated,
        })
    }

    /// The best answer, unless it is a semantic hit below `min_semantic_score`.
    fn confident<'a>(&self, answers: &'a AnswerSet) -> Option<&'a RetrievalAnswer> {
        let best = answers.best()?;
        if best.source == RetrievalSource::Semantic && best.score < self.config.min_semantic_score {
            debug!(score = best.score, min = self.config.min_semantic_score, "Best semantic hit too weak");
            return None;
        }
        Some(best)
    }

    fn escalate(
        &self,
        tenant: &TenantId,
        thread: &Thread,
        question: &str,
    ) -> Result<UnresolvedQuestion, ReceptionistError> {
        let record = self.escalation.log_unanswered(
            tenant.as_str(),
            question,
            Some(thread.id.as_str()),
            Some(thread.with.as_str()),
        )?;
        info!(tenant = %tenant, thread_id = %thread.id, question_id = %record.id, "No answer, question escalated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use frontdesk_core::config::RetrievalConfig;
    use frontdesk_core::error::FrontdeskError;
    use frontdesk_core::types::{Channel, Origin, QuestionStatus, QuickAnswer, SemanticHit};
    use frontdesk_storage::{Database, KnowledgeIndex, QuestionRepository, QuickAnswerRepository};

    use crate::error::{EscalationError, RetrievalError};
    use crate::escalation::QuestionStore;
    use crate::notifier::NoopNotifier;
    use crate::retrieval::{QuickAnswerCache, SemanticIndex};

    struct Cache(Option<QuickAnswer>);

    #[async_trait]
    impl QuickAnswerCache for Cache {
        async fn lookup(&self, _: &TenantId, _: &str) -> Result<Option<QuickAnswer>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    enum Index {
        Hits(Vec<SemanticHit>),
        Down,
    }

    #[async_trait]
    impl SemanticIndex for Index {
        async fn search(&self, _: &TenantId, _: &str, _: usize) -> Result<Vec<SemanticHit>, RetrievalError> {
            match self {
                Index::Hits(hits) => Ok(hits.clone()),
                Index::Down => Err(RetrievalError::Unavailable("offline".to_string())),
            }
        }
    }

    struct OfflineQuestions;

    impl QuestionStore for OfflineQuestions {
        fn insert(&self, _: &UnresolvedQuestion) -> Result<(), FrontdeskError> {
            Err(FrontdeskError::Storage("database is locked".to_string()))
        }
    }

    struct Harness {
        receptionist: Receptionist,
        questions: Arc<QuestionRepository>,
    }

    fn harness(cache: Option<QuickAnswer>, index: Index, config: RoutingConfig) -> Harness {
        let questions = Arc::new(QuestionRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        let receptionist = build(cache, index, config, questions.clone());
        Harness {
            receptionist,
            questions,
        }
    }

    fn build(
        cache: Option<QuickAnswer>,
        index: Index,
        config: RoutingConfig,
        questions: Arc<dyn QuestionStore>,
    ) -> Receptionist {
        let threads = Arc::new(ThreadStore::new(config.max_message_chars));
        let router = Arc::new(RetrievalRouter::new(
            Arc::new(Cache(cache)),
            Arc::new(index),
            RetrievalConfig::default(),
        ));
        let escalation = Arc::new(EscalationLogger::new(questions));
        let dispatcher = Arc::new(OutboundDispatcher::new(
            Arc::clone(&threads),
            Arc::new(NoopNotifier),
        ));
        Receptionist::new(threads, router, escalation, dispatcher, config)
    }

    fn tenant() -> TenantId {
        TenantId::parse("t1").unwrap()
    }

    fn sms(text: &str) -> InboundMessage {
        InboundMessage {
            channel: Channel::Sms,
            from: "+15551234567".to_string(),
            text: text.to_string(),
            received_at: None,
        }
    }

    #[tokio::test]
    async fn test_quick_answer_reply() {
        let h = harness(
            Some(QuickAnswer {
                answer: "We open at 9.".to_string(),
                confidence: 0.95,
                question_type: None,
            }),
            Index::Hits(vec![]),
            RoutingConfig::default(),
        );

        let outcome = h.receptionist.handle_inbound(&tenant(), &sms("hours?")).await.unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("We open at 9."));
        assert_eq!(outcome.source, Some(RetrievalSource::QuickAnswer));
        assert!(outcome.escalated.is_none());
        assert_eq!(outcome.thread.messages.len(), 2);
        assert_eq!(outcome.thread.messages[1].origin, Origin::Agent);
    }

    #[tokio::test]
    async fn test_semantic_reply_uses_best_hit() {
        let h = harness(
            None,
            Index::Hits(vec![
                SemanticHit {
                    content: "Parking is behind the building.".to_string(),
                    score: 0.6,
                    relevance_type: "location".to_string(),
                },
                SemanticHit {
                    content: "Street parking nearby.".to_string(),
                    score: 0.3,
                    relevance_type: "location".to_string(),
                },
            ]),
            RoutingConfig::default(),
        );

        let outcome = h.receptionist.handle_inbound(&tenant(), &sms("parking?")).await.unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("Parking is behind the building."));
        assert_eq!(outcome.source, Some(RetrievalSource::Semantic));
    }

    #[tokio::test]
    async fn test_weak_semantic_hit_escalates() {
        let config = RoutingConfig {
            min_semantic_score: 0.5,
            ..RoutingConfig::default()
        };
        let h = harness(
            None,
            Index::Hits(vec![SemanticHit {
                content: "Parking is behind the building.".to_string(),
                score: 0.3,
                relevance_type: "location".to_string(),
            }]),
            config,
        );

        let outcome = h
            .receptionist
            .handle_inbound(&tenant(), &sms("Do you sell gift cards?"))
            .await
            .unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("I don't have an answer for that yet."));
        assert_eq!(outcome.source, None);
        assert!(outcome.escalated.is_some());
        assert_eq!(h.questions.count(&tenant()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_knowledge_does_not_answer() {
        let db = Arc::new(Database::in_memory().unwrap());
        let index = Arc::new(KnowledgeIndex::new(Arc::clone(&db)));
        index
            .add_chunk(
                &tenant(),
                "Parking is free behind the clinic. Do you need directions?",
                "location",
            )
            .unwrap();
        let questions = Arc::new(QuestionRepository::new(Arc::clone(&db)));

        let threads = Arc::new(ThreadStore::new(4_000));
        let router = Arc::new(RetrievalRouter::new(
            Arc::new(QuickAnswerRepository::new(Arc::clone(&db))),
            index,
            RetrievalConfig::default(),
        ));
        let dispatcher = Arc::new(OutboundDispatcher::new(
            Arc::clone(&threads),
            Arc::new(NoopNotifier),
        ));
        let receptionist = Receptionist::new(
            threads,
            router,
            Arc::new(EscalationLogger::new(questions.clone())),
            dispatcher,
            RoutingConfig::default(),
        );

        let outcome = receptionist
            .handle_inbound(&tenant(), &sms("Do you sell gift cards?"))
            .await
            .unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("I don't have an answer for that yet."));
        assert!(outcome.escalated.is_some());
        assert_eq!(questions.count(&tenant()).unwrap(), 1);

        let outcome = receptionist
            .handle_inbound(&tenant(), &sms("Is parking free?"))
            .await
            .unwrap();
        assert_eq!(outcome.source, Some(RetrievalSource::Semantic));
        assert!(outcome.escalated.is_none());
    }

    #[tokio::test]
    async fn test_no_results_escalates_and_falls_back() {
        let h = harness(None, Index::Hits(vec![]), RoutingConfig::default());

        let outcome = h
            .receptionist
            .handle_inbound(&tenant(), &sms("Do you sell gift cards?"))
            .await
            .unwrap();

        assert_eq!(outcome.reply.as_deref(), Some("I don't have an answer for that yet."));
        assert_eq!(outcome.source, None);
        let escalated = outcome.escalated.unwrap();
        assert_eq!(escalated.status, QuestionStatus::Open);
        assert_eq!(escalated.call_id.as_deref(), Some(outcome.thread.id.as_str()));
        assert_eq!(escalated.asked_by.as_deref(), Some("+15551234567"));
        assert_eq!(h.questions.count(&tenant()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_failure_escalates_and_falls_back() {
        let h = harness(None, Index::Down, RoutingConfig::default());
        let outcome = h.receptionist.handle_inbound(&tenant(), &sms("hours?")).await.unwrap();
        assert!(outcome.escalated.is_some());
        assert_eq!(outcome.thread.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_escalation_storage_failure_propagates() {
        let receptionist = build(
            None,
            Index::Hits(vec![]),
            RoutingConfig::default(),
            Arc::new(OfflineQuestions),
        );
        let err = receptionist
            .handle_inbound(&tenant(), &sms("hours?"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReceptionistError::Escalation(EscalationError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_auto_reply_off_only_ingests() {
        let config = RoutingConfig {
            auto_reply: false,
            ..RoutingConfig::default()
        };
        let h = harness(None, Index::Hits(vec![]), config);
        let outcome = h.receptionist.handle_inbound(&tenant(), &sms("hours?")).await.unwrap();
        assert!(outcome.reply.is_none());
        assert_eq!(outcome.thread.messages.len(), 1);
        assert_eq!(h.questions.count(&tenant()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_inbound_is_recorded_without_reply() {
        let h = harness(None, Index::Hits(vec![]), RoutingConfig::default());
        let outcome = h.receptionist.handle_inbound(&tenant(), &sms("   ")).await.unwrap();
        assert!(outcome.reply.is_none());
        assert_eq!(outcome.thread.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sender_is_rejected() {
        let h = harness(None, Index::Hits(vec![]), RoutingConfig::default());
        let inbound = InboundMessage {
            from: "".to_string(),
            ..sms("hi")
        };
        assert!(matches!(
            h.receptionist.handle_inbound(&tenant(), &inbound).await,
            Err(ReceptionistError::Thread(_))
        ));
    }
}
