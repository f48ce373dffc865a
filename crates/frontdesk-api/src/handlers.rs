//! Route handler functions for all API endpoints.
//!
//! Handlers parse path and body input into domain types, call one engine
//! component, and map its result onto JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use frontdesk_core::types::{
    AnswerSet, InboundMessage, ProfileSuggestions, QuestionStatus, QuickAnswer, TenantId,
    TenantProfile, Thread, ThreadId, TranscriptEntry, UnresolvedQuestion,
};
use frontdesk_routing::{suggest_profile_updates, InboundOutcome};
use frontdesk_storage::normalize_question;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_QUESTION_LIMIT: u64 = 50;
const MAX_QUESTION_LIMIT: u64 = 500;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub query: String,
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuestionRequest {
    pub question: String,
    pub call_id: Option<String>,
    pub asked_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct QuickAnswerRequest {
    pub question: String,
    pub answer: String,
    pub confidence: f64,
    pub question_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeRequest {
    pub content: String,
    pub relevance_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsRequest {
    pub transcripts: Vec<TranscriptEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EventParams {
    /// Only stream events for this tenant.
    pub tenant: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub features: Vec<String>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// False when the text was blank and nothing was appended.
    pub sent: bool,
    pub thread: Thread,
}

#[derive(Debug, Serialize)]
pub struct QuestionListResponse {
    pub questions: Vec<UnresolvedQuestion>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct QuickAnswerResponse {
    pub question_key: String,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeResponse {
    pub id: i64,
    /// Chunks indexed for the tenant after this change.
    pub total: u64,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness and enabled features. No auth.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut features = vec![
        "quick_answers".to_string(),
        "semantic_search".to_string(),
        "escalation".to_string(),
    ];
    if state.config.routing.auto_reply {
        features.push("auto_reply".to_string());
    }
    if state.config.webhook.url.is_some() {
        features.push("webhook".to_string());
    }

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /tenants/{tenant}/inbound - channel adapter delivery.
pub async fn inbound(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<InboundMessage>,
) -> Result<Json<InboundOutcome>, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    let outcome = state.receptionist.handle_inbound(&tenant, &body).await?;
    Ok(Json(outcome))
}

/// GET /tenants/{tenant}/threads/{thread_id} - thread snapshot.
pub async fn get_thread(
    State(state): State<AppState>,
    Path((tenant, thread_id)): Path<(String, String)>,
) -> Result<Json<Thread>, ApiError> {
    let thread = lookup_thread(&state, &tenant, &thread_id)?;
    Ok(Json(thread))
}

/// POST /tenants/{tenant}/threads/{thread_id}/messages - agent reply.
pub async fn send_message(
    State(state): State<AppState>,
    Path((tenant, thread_id)): Path<(String, String)>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let thread = lookup_thread(&state, &tenant, &thread_id)?;
    let response = match state.dispatcher.send_agent_message(Some(&thread), &body.text)? {
        Some(dispatched) => SendMessageResponse {
            sent: true,
            thread: dispatched.thread,
        },
        None => SendMessageResponse {
            sent: false,
            thread,
        },
    };
    Ok(Json(response))
}

/// POST /tenants/{tenant}/answer - retrieval without side effects.
pub async fn answer(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<AnswerSet>, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    let answers = state.router.answer(&tenant, &body.query, body.k).await?;
    Ok(Json(answers))
}

/// POST /tenants/{tenant}/questions - record an unanswered question.
pub async fn log_question(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<LogQuestionRequest>,
) -> Result<(StatusCode, Json<UnresolvedQuestion>), ApiError> {
    let record = state.escalation.log_unanswered(
        &tenant,
        &body.question,
        body.call_id.as_deref(),
        body.asked_by.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /tenants/{tenant}/questions?status=&limit= - newest first.
pub async fn list_questions(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(params): Query<QuestionListParams>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<QuestionStatus>)
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_QUESTION_LIMIT)
        .clamp(1, MAX_QUESTION_LIMIT);

    let questions = state.questions.list(&tenant, status, limit)?;
    let total = state.questions.count(&tenant)?;
    Ok(Json(QuestionListResponse { questions, total }))
}

/// POST /tenants/{tenant}/quick-answers - curate a cached answer.
pub async fn upsert_quick_answer(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<QuickAnswerRequest>,
) -> Result<Json<QuickAnswerResponse>, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    let answer = QuickAnswer {
        answer: body.answer,
        confidence: body.confidence,
        question_type: body.question_type,
    };
    state.quick_answers.upsert(&tenant, &body.question, &answer)?;
    Ok(Json(QuickAnswerResponse {
        question_key: normalize_question(&body.question),
    }))
}

/// POST /tenants/{tenant}/knowledge - index a knowledge chunk.
pub async fn add_knowledge(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(body): Json<KnowledgeRequest>,
) -> Result<(StatusCode, Json<KnowledgeResponse>), ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    let relevance_type = body.relevance_type.as_deref().unwrap_or("document");
    let id = state.knowledge.add_chunk(&tenant, &body.content, relevance_type)?;
    let total = state.knowledge.count(&tenant)?;
    Ok((StatusCode::CREATED, Json(KnowledgeResponse { id, total })))
}

/// DELETE /tenants/{tenant}/knowledge/{id} - drop a chunk from the index.
pub async fn remove_knowledge(
    State(state): State<AppState>,
    Path((tenant, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    if state.knowledge.remove_chunk(&tenant, id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("knowledge chunk not found: {tenant}/{id}")))
    }
}

/// GET /tenants/{tenant}/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<TenantProfile>, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    Ok(Json(state.profiles.profile(&tenant)?))
}

/// PATCH /tenants/{tenant}/profile - shallow merge, last write wins.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(update): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<Json<TenantProfile>, ApiError> {
    let tenant = TenantId::parse(&tenant)?;
    Ok(Json(state.profiles.apply_profile_update(&tenant, &update)?))
}

/// POST /tenants/{tenant}/profile/suggestions - FAQs from transcripts.
pub async fn suggest_profile(
    Path(tenant): Path<String>,
    Json(body): Json<SuggestionsRequest>,
) -> Result<Json<ProfileSuggestions>, ApiError> {
    TenantId::parse(&tenant)?;
    Ok(Json(suggest_profile_updates(&body.transcripts)))
}

/// GET /events - SSE stream of domain events.
pub async fn events(
    State(state): State<AppState>,
    Query(params): Query<EventParams>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let tenant = params.tenant.as_deref().map(TenantId::parse).transpose()?;
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            if tenant.as_ref().is_some_and(|t| t != event.tenant_id()) {
                return None;
            }
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event(event.name()).data(data)))
        }
        // Lagged subscribers skip what they missed.
        Err(_) => None,
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn lookup_thread(state: &AppState, tenant: &str, thread_id: &str) -> Result<Thread, ApiError> {
    let tenant = TenantId::parse(tenant)?;
    let thread_id = ThreadId::from(thread_id);
    state
        .threads
        .get(&tenant, &thread_id)?
        .ok_or_else(|| ApiError::NotFound(format!("thread not found: {tenant}/{thread_id}")))
}
