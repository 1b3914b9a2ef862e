//! Application-level error type and its HTTP mapping.
//!
//! All route handlers return `Result<T, AppError>`. Server-side failures are
//! logged here and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::AuthError, repository::RepositoryError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound { .. } => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UsernameTaken | AuthError::AlreadyRegistered => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(RepositoryError::Conflict(_)) => StatusCode::BAD_REQUEST,
                AuthError::PasswordHash
                | AuthError::ExpiryOutOfRange
                | AuthError::Token(_)
                | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound { entity, id }) => {
                format!("{entity} with ID: {id} not found")
            }
            Self::Database(RepositoryError::Conflict(_)) => "Record already exists".to_owned(),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_owned(),
            Self::Auth(AuthError::InvalidToken) => "Invalid or expired token".to_owned(),
            Self::Auth(AuthError::UsernameTaken) => "Username already registered".to_owned(),
            Self::Auth(AuthError::AlreadyRegistered) => {
                "Username or email already registered".to_owned()
            }
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
            _ => "Internal server error".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "error"
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            "fail"
        };

        let body = json!({
            "status": kind,
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Todo 3".to_owned());
        assert_eq!(err.to_string(), "Not found: Todo 3");

        let err = AppError::BadRequest("invalid input".to_owned());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            status_of(RepositoryError::NotFound { entity: "Todo", id: 1 }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RepositoryError::Conflict("dup".to_owned()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RepositoryError::Storage(sqlx::Error::PoolTimedOut).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AuthError::InvalidToken.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::UsernameTaken.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AuthError::AlreadyRegistered.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AuthError::ExpiryOutOfRange.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(AuthError::PasswordHash.into()), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(AppError::Unauthorized("no token".to_owned())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(RepositoryError::Storage(sqlx::Error::PoolTimedOut));
        assert_eq!(err.message(), "Internal server error");

        let err = AppError::from(AuthError::ExpiryOutOfRange);
        assert_eq!(err.message(), "Internal server error");
    }
}
