//! Bearer-token authentication for operator and adapter endpoints.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use crate::state::AppState;

/// Random 32-character hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Read the token stored at `token_path`, or create one there.
///
/// A token that cannot be saved is still returned; it only lives for this
/// process.
pub fn load_or_generate_token(token_path: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            tracing::info!(path = %token_path.display(), "API token loaded");
            return token;
        }
    }

    let token = generate_token();
    if let Some(parent) = token_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(token_path, &token) {
        Ok(()) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600));
            }
            tracing::info!(path = %token_path.display(), "API token generated");
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %token_path.display(), "Failed to save API token");
        }
    }
    token
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Rejects requests without `Authorization: Bearer <api_token>` with 401.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return unauthorized("Missing Authorization header");
    };
    let Ok(value) = value.to_str() else {
        return unauthorized("Invalid Authorization header encoding");
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token.as_bytes(), state.api_token.as_bytes()) => {
            next.run(req).await
        }
        _ => unauthorized("Invalid bearer token"),
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
