//! Platform Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::api::common::ApiError;
use crate::domain::{EventId, UserId};

/// Postgres SQLSTATE codes that a caller may retry.
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available (lock_timeout)
    "57014", // query_canceled (statement_timeout)
];

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Event {event_id} is full")]
    EventFull { event_id: EventId },

    #[error("User {user_id} is already registered for event {event_id}")]
    AlreadyRegistered { user_id: UserId, event_id: EventId },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Datastore temporarily unavailable: {message}")]
    TransientStore { message: String },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientStore { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// `EventFull`, `AlreadyRegistered` and `Duplicate` are conflicts with current state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::EventFull { .. } | Self::AlreadyRegistered { .. } | Self::Duplicate { .. }
        )
    }

    /// Whether the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }

    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } | Self::InvalidCredentials => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::EventFull { .. } => "EVENT_FULL",
            Self::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            Self::Duplicate { .. } => "DUPLICATE",
            Self::TransientStore { .. } => "TRANSIENT_STORE_ERROR",
            Self::Database(_) | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::EventFull { .. } | Self::AlreadyRegistered { .. } | Self::Duplicate { .. } => {
                StatusCode::CONFLICT
            }
            Self::TransientStore { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Store and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::EventFull { .. } => "Event is full".to_string(),
            Self::AlreadyRegistered { .. } => "Already registered for this event".to_string(),
            Self::TransientStore { .. } => "Service temporarily unavailable, please retry".to_string(),
            Self::Database(_) | Self::Internal { .. } => "Internal server error".to_string(),
            Self::Unauthorized { message } => message.clone(),
            Self::Validation { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for PlatformError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db) => db
                .code()
                .map(|code| RETRYABLE_SQLSTATES.contains(&&*code))
                .unwrap_or(false),
            _ => false,
        };

        if transient {
            Self::TransientStore { message: err.to_string() }
        } else {
            Self::Database(err)
        }
    }
}

/// True when the error is a unique-constraint violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c == UNIQUE_VIOLATION).unwrap_or(false),
        _ => false,
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "Request failed");
        }

        let details = if self.is_retryable() {
            Some(serde_json::json!({ "retryable": true }))
        } else {
            None
        };

        let body = ApiError {
            error: self.code().to_string(),
            message: self.public_message(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert!(PlatformError::EventFull { event_id: 1 }.is_conflict());
        assert!(PlatformError::AlreadyRegistered { user_id: 1, event_id: 1 }.is_conflict());
        assert!(!PlatformError::not_found("Event", 1).is_conflict());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PlatformError::EventFull { event_id: 1 }.status_code(), StatusCode::CONFLICT);
        assert_eq!(PlatformError::not_found("Event", 9).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(PlatformError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(PlatformError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            PlatformError::transient("timeout").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err: PlatformError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let err = PlatformError::internal("connection string postgres://secret@db");
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
