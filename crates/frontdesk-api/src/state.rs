//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use frontdesk_core::config::FrontdeskConfig;
use frontdesk_core::error::FrontdeskError;
use frontdesk_routing::{
    EscalationLogger, EventBus, OutboundDispatcher, ProfileMerger, Receptionist, RetrievalRouter,
    ThreadStore, WebhookNotifier,
};
use frontdesk_storage::{
    Database, KnowledgeIndex, ProfileRepository, QuestionRepository, QuickAnswerRepository,
    ThreadRepository,
};

/// Shared application state.
///
/// Every field is cheap to clone; services are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FrontdeskConfig>,
    pub database: Arc<Database>,
    pub threads: Arc<ThreadStore>,
    pub questions: Arc<QuestionRepository>,
    pub quick_answers: Arc<QuickAnswerRepository>,
    pub knowledge: Arc<KnowledgeIndex>,
    pub router: Arc<RetrievalRouter>,
    pub escalation: Arc<EscalationLogger>,
    pub dispatcher: Arc<OutboundDispatcher>,
    pub profiles: Arc<ProfileMerger>,
    pub receptionist: Arc<Receptionist>,
    /// Domain events for the SSE stream.
    pub events: EventBus,
    pub api_token: String,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the engine onto `database` and restore persisted threads.
    pub fn new(
        config: FrontdeskConfig,
        database: Arc<Database>,
        notifier: Arc<dyn WebhookNotifier>,
        api_token: String,
    ) -> Result<Self, FrontdeskError> {
        let events = EventBus::default();

        let journal = Arc::new(ThreadRepository::new(Arc::clone(&database)));
        let threads = Arc::new(ThreadStore::with_journal(
            config.routing.max_message_chars,
            journal.clone(),
        ));
        threads
            .hydrate(journal.load_all()?)
            .map_err(|e| FrontdeskError::Storage(e.to_string()))?;
        threads.register_observer(Arc::new(events.clone()));

        let questions = Arc::new(QuestionRepository::new(Arc::clone(&database)));
        let quick_answers = Arc::new(QuickAnswerRepository::new(Arc::clone(&database)));
        let knowledge = Arc::new(KnowledgeIndex::new(Arc::clone(&database)));

        let router = Arc::new(RetrievalRouter::new(
            quick_answers.clone(),
            knowledge.clone(),
            config.retrieval.clone(),
        ));
        let escalation =
            Arc::new(EscalationLogger::new(questions.clone()).with_events(events.clone()));
        let dispatcher = Arc::new(
            OutboundDispatcher::new(Arc::clone(&threads), notifier).with_events(events.clone()),
        );
        let profiles = Arc::new(
            ProfileMerger::new(Arc::new(ProfileRepository::new(Arc::clone(&database))))
                .with_events(events.clone()),
        );
        let receptionist = Arc::new(Receptionist::new(
            Arc::clone(&threads),
            Arc::clone(&router),
            Arc::clone(&escalation),
            Arc::clone(&dispatcher),
            config.routing.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            database,
            threads,
            questions,
            quick_answers,
            knowledge,
            router,
            escalation,
            dispatcher,
            profiles,
            receptionist,
            events,
            api_token,
            start_time: Instant::now(),
        })
    }
}
