use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use edgebus_core::models::TransitionRejection;
use edgebus_core::Error as CoreError;
use serde_json::json;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(CoreError::Internal(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            CoreError::InvalidTransition {
                transition,
                current_state,
                available_transitions,
                ..
            } => {
                let body = TransitionRejection {
                    status: "error".to_string(),
                    error: format!(
                        "Invalid transition '{}' from state '{}'. Available transitions: {:?}",
                        transition, current_state, available_transitions
                    ),
                    current_state,
                    available_transitions,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            err => {
                let body = Json(json!({
                    "status": "error",
                    "message": err.to_string(),
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
