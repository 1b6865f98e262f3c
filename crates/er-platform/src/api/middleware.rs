//! API Middleware
//!
//! Session extraction for Axum. The session token is read from an
//! `Authorization: Bearer` header first, then from the `session` cookie.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::domain::UserIdentity;
use crate::error::PlatformError;
use crate::service::{extract_bearer_token, AuthService};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Shared state the extractors need, installed as a request extension.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
}

fn session_token(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
    {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve(parts: &Parts) -> Result<Option<UserIdentity>, PlatformError> {
    let app_state = parts
        .extensions
        .get::<AppState>()
        .ok_or_else(|| PlatformError::internal("AppState not found"))?;

    Ok(session_token(parts).and_then(|token| app_state.auth_service.verify_session(&token)))
}

/// Extractor for authenticated requests
pub struct Authenticated(pub UserIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve(parts)?
            .map(Authenticated)
            .ok_or_else(|| PlatformError::unauthorized("Authentication required"))
    }
}

/// Extractor for optionally authenticated requests. Invalid or expired
/// sessions are treated as anonymous.
pub struct OptionalAuth(pub Option<UserIdentity>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(resolve(parts)?))
    }
}
