// Authentication and authorization error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::warn;

use crate::auth::models::Role;
use crate::error::ErrorResponse;

/// Authentication and authorization error types
#[derive(Debug)]
pub enum AuthError {
    // Authentication errors
    InvalidToken,
    ExpiredToken,
    MissingToken,

    // Authorization errors
    /// User lacks required permissions for the operation
    /// Contains the required role and the user's actual role
    InsufficientPermissions {
        required: Role,
        actual: Role,
    },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::ExpiredToken => write!(f, "Token has expired"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::InsufficientPermissions { required, actual } => {
                write!(f, "Insufficient permissions: required role '{}', but user has role '{}'", required, actual)
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::InvalidToken => {
                warn!("Invalid token attempt");
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            AuthError::ExpiredToken => {
                warn!("Expired token attempt");
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            AuthError::MissingToken => {
                warn!("Missing token in request");
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            AuthError::InsufficientPermissions { required, actual } => {
                warn!("Authorization failed: required role '{}', user has role '{}'", required, actual);
                (StatusCode::FORBIDDEN, "FORBIDDEN")
            }
        };

        ErrorResponse::new(code, self.error_message()).into_response_with(status)
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
        }
    }

    /// Message that is safe to send to clients
    pub fn error_message(&self) -> String {
        match self {
            AuthError::InsufficientPermissions { required, .. } => {
                format!("Insufficient permissions: required role '{}'", required)
            }
            other => other.to_string(),
        }
    }
}
