//! Integration tests for the Frontdesk API.
//!
//! Each test builds its own in-memory state and drives the router with
//! `oneshot`, covering happy paths, error mapping and authentication.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use frontdesk_api::create_router;
use frontdesk_api::handlers::HealthResponse;
use frontdesk_api::state::AppState;
use frontdesk_core::config::FrontdeskConfig;
use frontdesk_core::types::{TenantId, ThreadId};
use frontdesk_routing::NoopNotifier;
use frontdesk_storage::Database;

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "test-token-12345";

fn make_state() -> AppState {
    make_state_with(FrontdeskConfig::default())
}

fn make_state_with(config: FrontdeskConfig) -> AppState {
    let db = Arc::new(Database::in_memory().unwrap());
    AppState::new(config, db, Arc::new(NoopNotifier), TEST_TOKEN.to_string()).unwrap()
}

fn make_app() -> Router {
    create_router(make_state())
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn authed_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_post(uri: &str, body: Value) -> Request<Body> {
    authed_json("POST", uri, body)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

fn sms(from: &str, text: &str) -> Value {
    json!({"channel": "sms", "from": from, "text": text})
}

// =============================================================================
// Public endpoints and auth
// =============================================================================

#[tokio::test]
async fn test_health_no_auth_required() {
    let app = make_app();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.features.contains(&"auto_reply".to_string()));
    assert!(!health.features.contains(&"webhook".to_string()));
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = make_app();
    let resp = app
        .oneshot(
            Request::get("/tenants/t1/questions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let app = make_app();
    let resp = app
        .oneshot(
            Request::get("/tenants/t1/questions")
                .header("authorization", "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Inbound pipeline and threads
// =============================================================================

#[tokio::test]
async fn test_inbound_creates_then_reuses_thread() {
    let app = make_app();

    let (status, first) = send(&app, authed_post("/tenants/t1/inbound", sms("+15551234567", "hours?"))).await;
    assert_eq!(status, StatusCode::OK);
    let thread_id = first["thread"]["id"].as_str().unwrap().to_string();
    assert!(thread_id.starts_with("sms-"));

    let (_, second) = send(
        &app,
        authed_post("/tenants/t1/inbound", sms("+1 (555) 123-4567", "and saturday?")),
    )
    .await;
    assert_eq!(second["thread"]["id"], thread_id.as_str());

    let (status, thread) = send(&app, authed_get(&format!("/tenants/t1/threads/{thread_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let origins: Vec<&str> = thread["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["origin"].as_str().unwrap())
        .collect();
    // Each inbound message gets a fallback reply from the agent.
    assert_eq!(origins, vec!["sms", "agent", "sms", "agent"]);
}

#[tokio::test]
async fn test_inbound_without_answer_escalates() {
    let app = make_app();

    let (_, outcome) = send(
        &app,
        authed_post("/tenants/t1/inbound", sms("+15551234567", "Do you sell gift cards?")),
    )
    .await;
    assert_eq!(outcome["reply"], "I don't have an answer for that yet.");
    assert_eq!(outcome["escalated"]["status"], "open");
    assert_eq!(outcome["escalated"]["asked_by"], "+15551234567");

    let (_, listed) = send(&app, authed_get("/tenants/t1/questions?status=open")).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["questions"][0]["question"], "Do you sell gift cards?");
}

#[tokio::test]
async fn test_inbound_answered_from_quick_answer() {
    let app = make_app();

    let (status, _) = send(
        &app,
        authed_post(
            "/tenants/t1/quick-answers",
            json!({"question": "What are your hours?", "answer": "9am to 5pm weekdays.", "confidence": 0.95}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, outcome) = send(
        &app,
        authed_post("/tenants/t1/inbound", sms("+15551234567", "what are your hours")),
    )
    .await;
    assert_eq!(outcome["reply"], "9am to 5pm weekdays.");
    assert_eq!(outcome["source"], "quick_answer");
    assert!(outcome["escalated"].is_null());
}

#[tokio::test]
async fn test_inbound_with_auto_reply_off() {
    let mut config = FrontdeskConfig::default();
    config.routing.auto_reply = false;
    let app = create_router(make_state_with(config));

    let (_, outcome) = send(&app, authed_post("/tenants/t1/inbound", sms("+15551234567", "hi"))).await;
    assert!(outcome["reply"].is_null());
    assert_eq!(outcome["thread"]["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inbound_validation_errors() {
    let app = make_app();

    let (status, body) = send(&app, authed_post("/tenants/t1/inbound", sms("  ", "hi"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let resp = app
        .clone()
        .oneshot(authed_post(
            "/tenants/t1/inbound",
            json!({"channel": "fax", "from": "+15551234567", "text": "hi"}),
        ))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_thread_is_not_found() {
    let app = make_app();
    let (status, body) = send(&app, authed_get("/tenants/t1/threads/sms-404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_threads_are_tenant_scoped() {
    let app = make_app();
    let (_, outcome) = send(&app, authed_post("/tenants/t1/inbound", sms("+15551234567", "hi"))).await;
    let thread_id = outcome["thread"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, authed_get(&format!("/tenants/t2/threads/{thread_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agent_message_append_and_blank_noop() {
    let mut config = FrontdeskConfig::default();
    config.routing.auto_reply = false;
    let app = create_router(make_state_with(config));

    let (_, outcome) = send(&app, authed_post("/tenants/t1/inbound", sms("+15551234567", "hi"))).await;
    let thread_id = outcome["thread"]["id"].as_str().unwrap().to_string();
    let uri = format!("/tenants/t1/threads/{thread_id}/messages");

    let (status, sent) = send(&app, authed_post(&uri, json!({"text": "Hello! How can I help?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["sent"], true);
    assert_eq!(sent["thread"]["messages"][1]["origin"], "agent");

    let (_, blank) = send(&app, authed_post(&uri, json!({"text": "   "}))).await;
    assert_eq!(blank["sent"], false);
    assert_eq!(blank["thread"]["messages"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Retrieval, knowledge and escalation
// =============================================================================

#[tokio::test]
async fn test_answer_from_knowledge() {
    let app = make_app();

    let (status, created) = send(
        &app,
        authed_post(
            "/tenants/t1/knowledge",
            json!({"content": "Free parking is available behind the clinic.", "relevance_type": "location"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["id"].as_i64().is_some());

    let (status, answers) = send(
        &app,
        authed_post("/tenants/t1/answer", json!({"query": "where can I park?", "k": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answers["search_type"], "semantic");
    assert_eq!(answers["query_expanded"], false);
    assert_eq!(answers["results"][0]["relevance_type"], "location");
    assert_eq!(answers["results"][0]["source"], "semantic");
}

#[tokio::test]
async fn test_remove_knowledge_chunk() {
    let app = make_app();

    let (_, created) = send(
        &app,
        authed_post(
            "/tenants/t1/knowledge",
            json!({"content": "Free parking is available behind the clinic."}),
        ),
    )
    .await;
    assert_eq!(created["total"], 1);
    let uri = format!("/tenants/t1/knowledge/{}", created["id"].as_i64().unwrap());

    let delete = |uri: &str| {
        Request::delete(uri)
            .header("authorization", format!("Bearer {}", TEST_TOKEN))
            .body(Body::empty())
            .unwrap()
    };
    let resp = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, answers) = send(
        &app,
        authed_post("/tenants/t1/answer", json!({"query": "where can I park?"})),
    )
    .await;
    assert_eq!(answers["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_inbound_unrelated_knowledge_escalates() {
    let app = make_app();
    send(
        &app,
        authed_post(
            "/tenants/t1/knowledge",
            json!({"content": "Parking is free behind the clinic. Do you need directions?"}),
        ),
    )
    .await;

    let (_, outcome) = send(
        &app,
        authed_post("/tenants/t1/inbound", sms("+15551234567", "Do you sell gift cards?")),
    )
    .await;
    assert_eq!(outcome["reply"], "I don't have an answer for that yet.");
    assert_eq!(outcome["escalated"]["status"], "open");
}

#[tokio::test]
async fn test_answer_quick_answer_threshold_is_strict() {
    let app = make_app();
    send(
        &app,
        authed_post(
            "/tenants/t1/quick-answers",
            json!({"question": "Do you take walk-ins?", "answer": "Yes.", "confidence": 0.8}),
        ),
    )
    .await;

    let (_, answers) = send(
        &app,
        authed_post("/tenants/t1/answer", json!({"query": "Do you take walk-ins?"})),
    )
    .await;
    assert_eq!(answers["search_type"], "semantic");
    assert_eq!(answers["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_answer_rejects_empty_query() {
    let app = make_app();
    let (status, _) = send(&app, authed_post("/tenants/t1/answer", json!({"query": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quick_answer_rejects_bad_confidence() {
    let app = make_app();
    let (status, _) = send(
        &app,
        authed_post(
            "/tenants/t1/quick-answers",
            json!({"question": "q", "answer": "a", "confidence": 1.5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_log_question_and_validation() {
    let app = make_app();

    let (status, record) = send(
        &app,
        authed_post(
            "/tenants/t1/questions",
            json!({"question": "Is there wheelchair access?", "call_id": "call-9"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["status"], "open");
    assert_eq!(record["call_id"], "call-9");

    let (status, _) = send(&app, authed_post("/tenants/t1/questions", json!({"question": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = send(&app, authed_get("/tenants/t1/questions")).await;
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_list_questions_rejects_unknown_status() {
    let app = make_app();
    let (status, _) = send(&app, authed_get("/tenants/t1/questions?status=closed")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_profile_merge_and_read() {
    let app = make_app();

    let (status, empty) = send(&app, authed_get("/tenants/t1/profile")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["fields"], json!({}));

    send(
        &app,
        authed_json("PATCH", "/tenants/t1/profile", json!({"hours": "9-5", "phone": "555"})),
    )
    .await;
    let (_, merged) = send(
        &app,
        authed_json("PATCH", "/tenants/t1/profile", json!({"hours": "8-6"})),
    )
    .await;
    assert_eq!(merged["fields"], json!({"hours": "8-6", "phone": "555"}));

    let (_, read) = send(&app, authed_get("/tenants/t1/profile")).await;
    assert_eq!(read["fields"], merged["fields"]);
}

#[tokio::test]
async fn test_profile_suggestions() {
    let app = make_app();
    let (status, suggestions) = send(
        &app,
        authed_post(
            "/tenants/t1/profile/suggestions",
            json!({"transcripts": [
                {"question": "Open Sunday?", "answer": "No", "intent": "faq"},
                {"question": "Book 3pm", "intent": "booking"},
                {"question": "Open Sunday?", "answer": "Closed", "intent": "faq"}
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        suggestions["faqs"],
        json!([{"question": "Open Sunday?", "answer": "No"}])
    );
}

// =============================================================================
// Persistence across restarts
// =============================================================================

#[tokio::test]
async fn test_threads_survive_state_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("frontdesk.db");

    let thread_id = {
        let db = Arc::new(Database::new(&db_path).unwrap());
        let state = AppState::new(
            FrontdeskConfig::default(),
            db,
            Arc::new(NoopNotifier),
            TEST_TOKEN.to_string(),
        )
        .unwrap();
        let app = create_router(state);
        let (_, outcome) = send(&app, authed_post("/tenants/t1/inbound", sms("+15551234567", "hi"))).await;
        outcome["thread"]["id"].as_str().unwrap().to_string()
    };

    let db = Arc::new(Database::new(&db_path).unwrap());
    let state = AppState::new(
        FrontdeskConfig::default(),
        db,
        Arc::new(NoopNotifier),
        TEST_TOKEN.to_string(),
    )
    .unwrap();
    let restored = state
        .threads
        .get(&TenantId::parse("t1").unwrap(), &ThreadId::from(thread_id.as_str()))
        .unwrap()
        .unwrap();
    assert_eq!(restored.messages.len(), 2);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_inbound_publishes_domain_events() {
    let state = make_state();
    let mut rx = state.events.subscribe();
    let app = create_router(state);

    send(&app, authed_post("/tenants/t1/inbound", sms("+15551234567", "hi"))).await;

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(names[0], "thread_created");
    assert!(names.contains(&"message_appended"));
    assert!(names.contains(&"question_escalated"));
    assert!(names.contains(&"agent_message_sent"));
}

#[tokio::test]
async fn test_events_stream_requires_auth() {
    let app = make_app();
    let resp = app
        .oneshot(Request::get("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let app = make_app();
    let resp = app.oneshot(authed_get("/events?tenant=t1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
