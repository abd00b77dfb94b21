use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use murmur_db::StoreError;
use murmur_types::api::Envelope;

/// Domain failures surfaced to callers. Each variant carries a stable
/// kind and a human-readable message; infrastructure detail stays in the
/// logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("username is already taken")]
    UsernameTaken,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("user not found")]
    NotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("recipient is not accepting messages")]
    MessagesDisabled,

    #[error("incorrect verification code")]
    InvalidCode,

    #[error("verification code has expired, sign up again to receive a new one")]
    CodeExpired,

    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("verify your account before signing in")]
    NotVerified,

    #[error("not authenticated")]
    Unauthorized,

    #[error("failed to send the verification email, try again later")]
    Delivery(#[source] murmur_mailer::MailError),

    #[error("internal server error")]
    Storage(#[source] StoreError),

    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // The storage layer's conflict arbitration is authoritative;
        // everything else is a server fault.
        match err {
            StoreError::UsernameTaken => ApiError::UsernameTaken,
            StoreError::EmailTaken => ApiError::EmailTaken,
            other => ApiError::Storage(other),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::UsernameTaken
            | ApiError::EmailTaken
            | ApiError::InvalidCode
            | ApiError::CodeExpired => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::RecipientNotFound => StatusCode::NOT_FOUND,
            ApiError::MessagesDisabled | ApiError::NotVerified => StatusCode::FORBIDDEN,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Delivery(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Storage(err) => error!("Storage failure: {err}"),
            ApiError::Delivery(err) => error!("Verification email dispatch failed: {err}"),
            ApiError::Internal(err) => error!("Internal error: {err:#}"),
            _ => {}
        }

        (self.status(), Json(Envelope::error(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_domain_conflicts() {
        assert!(matches!(
            ApiError::from(StoreError::UsernameTaken),
            ApiError::UsernameTaken
        ));
        assert!(matches!(
            ApiError::from(StoreError::EmailTaken),
            ApiError::EmailTaken
        ));
    }

    #[test]
    fn statuses_follow_the_contract() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MessagesDisabled.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::RecipientNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::CodeExpired.status(), StatusCode::BAD_REQUEST);
    }
}
