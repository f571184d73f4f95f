use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::dispatch::DispatchError;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    success: bool,
    error: String,
}

/// ハンドラーの失敗を `{success:false, error}` に変換するエラー型。
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) | ApiError::NotFound(message) => message.clone(),
            ApiError::Internal(source) => format!("{source:#}"),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal(error)
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::PreconditionViolation(message) => ApiError::BadRequest(message),
            DispatchError::LedgerUnavailable(source) => {
                ApiError::Internal(source.context("ledger unavailable"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.message(), "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_map_to_status_codes() {
        let precondition = ApiError::from(DispatchError::PreconditionViolation(
            "message is required".to_string(),
        ));
        assert_eq!(precondition.status(), StatusCode::BAD_REQUEST);
        assert_eq!(precondition.message(), "message is required");

        let ledger = ApiError::from(DispatchError::LedgerUnavailable(anyhow::anyhow!(
            "connection reset"
        )));
        assert_eq!(ledger.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ledger.message(), "ledger unavailable: connection reset");
    }
}
