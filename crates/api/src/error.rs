use admix_core::error::CoreError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `admix_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request body that could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::InvalidState(msg) => {
                    (StatusCode::CONFLICT, "INVALID_STATE", msg.clone())
                }
                CoreError::IncompleteContent { missing } => {
                    let body = json!({
                        "error": core.to_string(),
                        "code": "INCOMPLETE_CONTENT",
                        "missing": missing,
                    });
                    return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response();
                }
                CoreError::StoreUnavailable(msg) => {
                    tracing::error!(error = %msg, "Store unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORE_UNAVAILABLE",
                        "The store is temporarily unavailable".to_string(),
                    )
                }
                CoreError::MalformedInput(msg) => {
                    (StatusCode::BAD_REQUEST, "MALFORMED_INPUT", msg.clone())
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn core_errors_map_to_statuses() {
        let cases = [
            (
                CoreError::NotFound { entity: "Version", id: "x".into() },
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (CoreError::InvalidState("frozen".into()), StatusCode::CONFLICT, "INVALID_STATE"),
            (
                CoreError::StoreUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
            (CoreError::MalformedInput("bad".into()), StatusCode::BAD_REQUEST, "MALFORMED_INPUT"),
        ];
        for (err, status, code) in cases {
            let (actual_status, body) = render(AppError::Core(err)).await;
            assert_eq!(actual_status, status);
            assert_eq!(body["code"], code);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn incomplete_content_carries_missing_count() {
        let (status, body) = render(AppError::Core(CoreError::IncompleteContent { missing: 3 })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INCOMPLETE_CONTENT");
        assert_eq!(body["missing"], 3);
    }

    #[tokio::test]
    async fn store_errors_do_not_leak_details() {
        let (_, body) = render(AppError::Core(CoreError::StoreUnavailable("password=hunter2".into()))).await;
        assert!(!body["error"].as_str().unwrap().contains("hunter2"));
    }
}
