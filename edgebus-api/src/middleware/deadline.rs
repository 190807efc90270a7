use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// Caps whole-request handling. Cluster calls can block for tens of seconds
/// and readiness waits up to a minute; anything past the deadline gets a 503.
pub async fn deadline_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let deadline = Duration::from_secs(state.config.request_deadline_secs);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                http.method = %method,
                http.path = %path,
                deadline_secs = deadline.as_secs(),
                "Request exceeded deadline"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "Request deadline exceeded",
                })),
            )
                .into_response()
        }
    }
}
