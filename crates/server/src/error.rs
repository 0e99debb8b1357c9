use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quiz_core::error::IdentityError;
use serde_json::json;
use services::{ConsistencyError, SyncServiceError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("authenticated user email is missing")]
    Unauthenticated,
    #[error(transparent)]
    BadIdentity(#[from] IdentityError),
    #[error("origin {0} is not allowed")]
    ForbiddenOrigin(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Sync(#[from] SyncServiceError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "NO_ACCESS_EMAIL"),
            Self::BadIdentity(_) => (StatusCode::UNAUTHORIZED, "BAD_ACCESS_EMAIL"),
            Self::ForbiddenOrigin(_) => (StatusCode::FORBIDDEN, "ORIGIN_NOT_ALLOWED"),
            Self::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "MALFORMED_PAYLOAD"),
            Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::Sync(err) => match err {
                SyncServiceError::MissingSyncKey => (StatusCode::BAD_REQUEST, "MISSING_SYNC_KEY"),
                SyncServiceError::SyncKeyMismatch => (StatusCode::FORBIDDEN, "SYNC_KEY_MISMATCH"),
                SyncServiceError::InvalidDelta(_) => (StatusCode::BAD_REQUEST, "INVALID_DELTA"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
            },
            Self::Consistency(err) => match err {
                ConsistencyError::MissingQid => (StatusCode::BAD_REQUEST, "MISSING_QID"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            error!("request failed: {self}");
            "internal error".to_owned()
        } else {
            self.to_string()
        };

        let body = json!({
            "ok": false,
            "error": { "code": code, "message": message },
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::StorageError;

    #[test]
    fn storage_details_stay_in_the_log() {
        let err = AppError::from(SyncServiceError::from(StorageError::Connection(
            "disk I/O error at /var/lib/quiz".into(),
        )));
        assert_eq!(
            err.status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
        );
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn key_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::from(SyncServiceError::MissingSyncKey).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(SyncServiceError::SyncKeyMismatch).status_and_code().0,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn consistency_errors_split_client_and_server_faults() {
        assert_eq!(
            AppError::from(ConsistencyError::MissingQid).status_and_code(),
            (StatusCode::BAD_REQUEST, "MISSING_QID")
        );
        assert_eq!(
            AppError::from(ConsistencyError::from(StorageError::Connection("down".into())))
                .status_and_code()
                .0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
