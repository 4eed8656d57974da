// Request extractors for authenticated and admin-only routes

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::{debug, warn};

use crate::auth::{error::AuthError, models::Role, token::TokenService};

/// Authenticated caller, as supplied to every order and payment operation
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub email: String,
    pub is_admin: bool,
}

impl AuthenticatedUser {
    /// Whether this caller may act on a resource owned by `owner_id`
    pub fn can_access(&self, owner_id: i32) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

/// Pull the bearer token out of the Authorization header
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Authorization header missing 'Bearer ' prefix for {}", parts.uri.path());
        AuthError::InvalidToken
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<TokenService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let token_service = Arc::<TokenService>::from_ref(state);
        let claims = token_service.validate_access_token(token)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            is_admin: claims.role == Role::Admin,
        })
    }
}

/// Authenticated caller that must hold the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<TokenService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(
                "Authorization failed: user_id={}, required_role=admin, endpoint={}",
                user.user_id,
                parts.uri.path()
            );
            return Err(AuthError::InsufficientPermissions {
                required: Role::Admin,
                actual: Role::User,
            });
        }

        debug!("Admin access granted: user_id={}, endpoint={}", user.user_id, parts.uri.path());
        Ok(AdminUser(user))
    }
}
