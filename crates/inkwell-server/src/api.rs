//! Shared API plumbing: the error type and the blocking database helper.

use crate::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inkwell_posts::PostError;
use rusqlite::Connection;

/// Errors returned by HTTP handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(detail) => {
                // The detail stays in the logs; clients get a fixed message.
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<PostError> for ApiError {
    fn from(e: PostError) -> Self {
        match e {
            PostError::Validation(msg) => ApiError::BadRequest(msg),
            PostError::NotFound(id) => ApiError::NotFound(format!("post {id} not found")),
            PostError::Database(err) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

/// Runs `op` against a pooled connection on the blocking thread pool.
///
/// The connection is returned to the pool when `op` finishes, whether it
/// succeeded or failed.
pub(crate) async fn with_conn<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, PostError> + Send + 'static,
{
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {e}")))?;
        op(&*conn).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn validation_maps_to_bad_request() {
        let response = ApiError::from(PostError::Validation("title is required".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "title is required");
    }

    #[tokio::test]
    async fn not_found_names_the_post() {
        let response = ApiError::from(PostError::NotFound(5)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "post 5 not found");
    }

    #[tokio::test]
    async fn database_errors_are_not_leaked() {
        let err = PostError::Database(rusqlite::Error::InvalidQuery);
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "internal server error");
    }
}
