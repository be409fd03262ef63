use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::CONFLICT, message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status.canonical_reason().unwrap_or("error");
        let body = Json(json!({ "error": { "code": code, "message": self.message } }));
        (self.status, body).into_response()
    }
}

impl From<syncoor_store::StoreError> for ApiError {
    fn from(e: syncoor_store::StoreError) -> Self {
        match e {
            syncoor_store::StoreError::NotFound(_) => ApiError::not_found(e.to_string()),
            syncoor_store::StoreError::Conflict(_) => ApiError::conflict(e.to_string()),
            syncoor_store::StoreError::MissingRunId => ApiError::bad_request(e.to_string()),
        }
    }
}
