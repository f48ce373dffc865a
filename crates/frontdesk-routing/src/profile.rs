//! Profile Merger: tenant knowledge profile suggestions and updates.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::events::DomainEvent;
use frontdesk_core::types::{FaqEntry, ProfileSuggestions, TenantId, TenantProfile, TranscriptEntry};
use frontdesk_storage::ProfileRepository;

use crate::events::EventBus;

const FAQ_INTENT: &str = "faq";

/// Collect FAQ-tagged transcript entries, first occurrence of each question
/// wins. Questions are compared after trimming; blank ones are skipped.
pub fn suggest_profile_updates(transcripts: &[TranscriptEntry]) -> ProfileSuggestions {
    let mut seen = HashSet::new();
    let faqs = transcripts
        .iter()
        .filter(|entry| {
            entry
                .intent
                .as_deref()
                .is_some_and(|intent| intent.trim().eq_ignore_ascii_case(FAQ_INTENT))
        })
        .filter_map(|entry| {
            let question = entry.question.trim();
            if question.is_empty() || !seen.insert(question.to_string()) {
                return None;
            }
            Some(FaqEntry {
                question: question.to_string(),
                answer: entry.answer.clone(),
            })
        })
        .collect();

    ProfileSuggestions { faqs }
}

/// Storage for the one profile document each tenant owns.
pub trait ProfileStore: Send + Sync {
    fn get(&self, tenant: &TenantId) -> Result<Option<TenantProfile>, FrontdeskError>;

    /// Shallow merge, last write wins per key, atomic per tenant.
    fn merge(
        &self,
        tenant: &TenantId,
        update: &Map<String, Value>,
    ) -> Result<TenantProfile, FrontdeskError>;
}

impl ProfileStore for ProfileRepository {
    fn get(&self, tenant: &TenantId) -> Result<Option<TenantProfile>, FrontdeskError> {
        ProfileRepository::get(self, tenant)
    }

    fn merge(
        &self,
        tenant: &TenantId,
        update: &Map<String, Value>,
    ) -> Result<TenantProfile, FrontdeskError> {
        ProfileRepository::merge(self, tenant, update)
    }
}

pub struct ProfileMerger {
    store: Arc<dyn ProfileStore>,
    events: Option<EventBus>,
}

impl ProfileMerger {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Current profile; empty when the tenant never had one.
    pub fn profile(&self, tenant: &TenantId) -> Result<TenantProfile, FrontdeskError> {
        Ok(self
            .store
            .get(tenant)?
            .unwrap_or_else(|| TenantProfile::empty(tenant.clone())))
    }

    /// Merge `update` into the tenant's profile. Keys are not validated.
    pub fn apply_profile_update(
        &self,
        tenant: &TenantId,
        update: &Map<String, Value>,
    ) -> Result<TenantProfile, FrontdeskError> {
        let profile = self.store.merge(tenant, update)?;
        let keys: Vec<String> = update.keys().cloned().collect();
        info!(tenant = %tenant, keys = keys.len(), "Merged profile update");

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ProfileUpdated {
                tenant_id: tenant.clone(),
                keys,
                timestamp: profile.updated_at,
            });
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use frontdesk_storage::Database;

    fn entry(question: &str, answer: Option<&str>, intent: Option<&str>) -> TranscriptEntry {
        TranscriptEntry {
            question: question.to_string(),
            answer: answer.map(str::to_string),
            intent: intent.map(str::to_string),
        }
    }

    fn merger() -> ProfileMerger {
        let db = Arc::new(Database::in_memory().unwrap());
        ProfileMerger::new(Arc::new(ProfileRepository::new(db)))
    }

    #[test]
    fn test_suggestions_keep_faqs_in_first_seen_order() {
        let transcripts = vec![
            entry("Are you open Sunday?", Some("No"), Some("faq")),
            entry("Book me for 3pm", None, Some("booking")),
            entry("Do you take insurance?", Some("Yes, most plans"), Some("FAQ")),
            entry("Are you open Sunday?", Some("Closed Sundays"), Some("faq")),
            entry("Untagged question", None, None),
        ];

        let suggestions = suggest_profile_updates(&transcripts);
        let questions: Vec<&str> = suggestions.faqs.iter().map(|f| f.question.as_str()).collect();
        assert_eq!(questions, vec!["Are you open Sunday?", "Do you take insurance?"]);
        // First occurrence's answer is kept.
        assert_eq!(suggestions.faqs[0].answer.as_deref(), Some("No"));
    }

    #[test]
    fn test_suggestions_skip_blank_and_trim() {
        let transcripts = vec![
            entry("  ", None, Some("faq")),
            entry(" Where do I park? ", None, Some("faq")),
            entry("Where do I park?", None, Some("faq")),
        ];
        let suggestions = suggest_profile_updates(&transcripts);
        assert_eq!(suggestions.faqs.len(), 1);
        assert_eq!(suggestions.faqs[0].question, "Where do I park?");
    }

    #[test]
    fn test_suggestions_empty_input() {
        assert_eq!(suggest_profile_updates(&[]), ProfileSuggestions::default());
    }

    #[test]
    fn test_apply_update_merges_shallowly() {
        let merger = merger();
        let t = TenantId::parse("t1").unwrap();

        assert!(merger.profile(&t).unwrap().fields.is_empty());

        merger
            .apply_profile_update(&t, json!({"hours": "9-5", "faqs": [1]}).as_object().unwrap())
            .unwrap();
        let merged = merger
            .apply_profile_update(&t, json!({"hours": "8-6"}).as_object().unwrap())
            .unwrap();

        assert_eq!(merged.fields["hours"], "8-6");
        assert_eq!(merged.fields["faqs"], json!([1]));
        assert_eq!(merger.profile(&t).unwrap().fields, merged.fields);
    }

    #[test]
    fn test_concurrent_updates_keep_every_key() {
        let merger = Arc::new(merger());
        let t = TenantId::parse("t1").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let merger = Arc::clone(&merger);
                let t = t.clone();
                std::thread::spawn(move || {
                    let mut update = Map::new();
                    update.insert(format!("key{i}"), json!(i));
                    merger.apply_profile_update(&t, &update).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(merger.profile(&t).unwrap().fields.len(), 8);
    }

    #[tokio::test]
    async fn test_update_is_published() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let merger = merger().with_events(bus);
        let t = TenantId::parse("t1").unwrap();

        merger
            .apply_profile_update(&t, json!({"hours": "9-5"}).as_object().unwrap())
            .unwrap();
        match rx.recv().await.unwrap() {
            DomainEvent::ProfileUpdated { keys, .. } => assert_eq!(keys, vec!["hours".to_string()]),
            other => panic!("unexpected event: {}", other.name()),
        }
    }
}
