//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use frontdesk_core::error::FrontdeskError;

use crate::handlers;
use crate::state::AppState;

/// Build the router. Everything except `/health` requires the bearer token.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health));

    let tenant_routes = Router::new()
        .route("/tenants/{tenant}/inbound", post(handlers::inbound))
        .route(
            "/tenants/{tenant}/threads/{thread_id}",
            get(handlers::get_thread),
        )
        .route(
            "/tenants/{tenant}/threads/{thread_id}/messages",
            post(handlers::send_message),
        )
        .route("/tenants/{tenant}/answer", post(handlers::answer))
        .route(
            "/tenants/{tenant}/questions",
            get(handlers::list_questions).post(handlers::log_question),
        )
        .route(
            "/tenants/{tenant}/quick-answers",
            post(handlers::upsert_quick_answer),
        )
        .route("/tenants/{tenant}/knowledge", post(handlers::add_knowledge))
        .route(
            "/tenants/{tenant}/knowledge/{id}",
            delete(handlers::remove_knowledge),
        )
        .route(
            "/tenants/{tenant}/profile",
            get(handlers::get_profile).patch(handlers::update_profile),
        )
        .route(
            "/tenants/{tenant}/profile/suggestions",
            post(handlers::suggest_profile),
        )
        .route("/events", get(handlers::events));

    let protected_routes = tenant_routes.route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        crate::auth::require_auth,
    ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` from config and serve until the process stops.
pub async fn start_server(state: AppState) -> Result<(), FrontdeskError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Frontdesk API listening");

    axum::serve(listener, router).await?;
    Ok(())
}
