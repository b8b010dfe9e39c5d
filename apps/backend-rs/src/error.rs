use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::billing::BillingError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    Dependency(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::UnprocessableEntity(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
            Self::Dependency(_) => (StatusCode::SERVICE_UNAVAILABLE, "dependency_failed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<BillingError> for AppError {
    fn from(error: BillingError) -> Self {
        match error {
            BillingError::NotFound(message) => Self::NotFound(message),
            BillingError::Conflict(message) => Self::Conflict(message),
            BillingError::InvalidState(message) => Self::Conflict(message),
            BillingError::Forbidden(message) => Self::Forbidden(message),
            BillingError::Validation(message) => Self::UnprocessableEntity(message),
            BillingError::Storage(message) => Self::Dependency(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::AppError;
    use crate::billing::BillingError;

    #[test]
    fn maps_billing_errors_to_http_status() {
        let cases = [
            (BillingError::NotFound("room".into()), StatusCode::NOT_FOUND),
            (BillingError::Conflict("dup".into()), StatusCode::CONFLICT),
            (BillingError::InvalidState("vacant".into()), StatusCode::CONFLICT),
            (BillingError::Forbidden("owner".into()), StatusCode::FORBIDDEN),
            (
                BillingError::Validation("month".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BillingError::Storage("db".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            let response = AppError::from(error).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
