use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FrontdeskError;

// =============================================================================
// Enums
// =============================================================================

/// Communication medium a message arrived on (or is sent over).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Text messages to a tenant phone number.
    Sms,
    /// Phone calls (transcribed utterances).
    Voice,
    /// The embeddable web chat widget.
    Chat,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Voice => "voice",
            Channel::Chat => "chat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = FrontdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(Channel::Sms),
            "voice" | "call" => Ok(Channel::Voice),
            "chat" | "web_chat" | "webchat" => Ok(Channel::Chat),
            other => Err(FrontdeskError::Validation(format!(
                "unknown channel: {other}"
            ))),
        }
    }
}

/// Who authored a message: an external party on a channel, or the agent.
///
/// Serialized as a bare string (`"sms"`, `"voice"`, `"chat"`, `"agent"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Origin {
    Channel(Channel),
    Agent,
}

impl Origin {
    pub const AGENT: &'static str = "agent";

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Channel(channel) => channel.as_str(),
            Origin::Agent => Self::AGENT,
        }
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.as_str().to_string()
    }
}

impl TryFrom<String> for Origin {
    type Error = FrontdeskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == Self::AGENT {
            return Ok(Origin::Agent);
        }
        value.parse::<Channel>().map(Origin::Channel)
    }
}

/// Which retrieval tier produced an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    /// Tenant-curated cached answer above the confidence threshold.
    QuickAnswer,
    /// Similarity search over indexed tenant content.
    Semantic,
}

impl RetrievalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalSource::QuickAnswer => "quick_answer",
            RetrievalSource::Semantic => "semantic",
        }
    }
}

/// Review state of an escalated question.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    #[default]
    Open,
    Resolved,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = FrontdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(QuestionStatus::Open),
            "resolved" => Ok(QuestionStatus::Resolved),
            other => Err(FrontdeskError::Validation(format!(
                "unknown question status: {other}"
            ))),
        }
    }
}

// =============================================================================
// Newtype Wrappers - Identifiers
// =============================================================================

/// A customer organization; the unit of data isolation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, FrontdeskError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FrontdeskError::Validation(
                "tenant must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External party key (phone number, chat session id). The thread dedup key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyKey(String);

impl PartyKey {
    /// Validate and normalize a party key.
    ///
    /// Phone-number-shaped keys lose their formatting characters so that
    /// `+1 (555) 123-4567` and `+15551234567` address the same thread.
    pub fn parse(raw: &str) -> Result<Self, FrontdeskError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FrontdeskError::Validation(
                "party key must not be empty".to_string(),
            ));
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();
        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        let phone_like =
            (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());

        if phone_like {
            Ok(Self(compact))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thread identifier, unique per tenant. Format: `{channel}-{millis}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(channel: Channel, created_at: Timestamp) -> Self {
        Self(format!("{}-{}", channel.as_str(), created_at.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Newtype Wrappers - Time
// =============================================================================

/// Milliseconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// Threads and Messages
// =============================================================================

/// One utterance within a thread. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub timestamp: Timestamp,
    pub text: String,
}

impl Message {
    pub fn inbound(channel: Channel, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            origin: Origin::Channel(channel),
            timestamp,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Agent,
            timestamp: Timestamp::now(),
            text: text.into(),
        }
    }
}

/// One conversation between a tenant and one external party.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub tenant_id: TenantId,
    /// The external party this conversation is with.
    pub with: PartyKey,
    /// Channel the thread was opened on. Later messages may arrive on others.
    pub channel: Channel,
    pub created_at: Timestamp,
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        tenant_id: TenantId,
        with: PartyKey,
        channel: Channel,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            tenant_id,
            with,
            channel,
            created_at,
            messages: Vec::new(),
        }
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.messages.last().map(|m| m.timestamp)
    }
}

/// A delivery from a channel adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: Channel,
    pub from: String,
    pub text: String,
    /// Capture time reported by the adapter; defaults to receipt time.
    #[serde(default)]
    pub received_at: Option<Timestamp>,
}

// =============================================================================
// Retrieval
// =============================================================================

/// A cached, tenant-curated answer returned by the quick-answer cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuickAnswer {
    pub answer: String,
    pub confidence: f64,
    pub question_type: Option<String>,
}

/// One hit returned by the semantic search index, best first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub content: String,
    pub score: f64,
    pub relevance_type: String,
}

/// A single routed answer. Transient, never persisted by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalAnswer {
    pub content: String,
    /// Confidence in 0.0..=1.0.
    pub score: f64,
    pub relevance_type: String,
    pub source: RetrievalSource,
}

/// The outcome of one routing decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerSet {
    pub results: Vec<RetrievalAnswer>,
    pub search_type: RetrievalSource,
    pub query_expanded: bool,
}

impl AnswerSet {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn best(&self) -> Option<&RetrievalAnswer> {
        self.results.first()
    }
}

// =============================================================================
// Escalation
// =============================================================================

/// A question the engine could not confidently answer, queued for review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedQuestion {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub question: String,
    pub call_id: Option<String>,
    pub asked_by: Option<String>,
    pub status: QuestionStatus,
    pub created_at: Timestamp,
}

// =============================================================================
// Knowledge profile
// =============================================================================

/// Freeform per-tenant knowledge document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub tenant_id: TenantId,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub updated_at: Timestamp,
}

impl TenantProfile {
    pub fn empty(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            fields: serde_json::Map::new(),
            updated_at: Timestamp(0),
        }
    }
}

/// One entry of a past conversation transcript, as labelled by the agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

/// A frequently-asked question derived from transcripts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: Option<String>,
}

/// Suggested profile changes derived from transcripts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSuggestions {
    pub faqs: Vec<FaqEntry>,
}
