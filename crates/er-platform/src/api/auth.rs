//! Auth API Endpoints
//!
//! - POST /auth/signup - Create a member account and start a session
//! - POST /auth/login - Password-based login
//! - POST /auth/logout - Clear the session cookie
//! - GET /auth/me - Current user info

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::common::{json_body, ApiResult};
use crate::api::middleware::{Authenticated, SESSION_COOKIE};
use crate::domain::{User, UserIdentity};
use crate::error::PlatformError;
use crate::service::{AuthService, IdentityService, IssuedSession, SignupCommand};

/// Signup request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: String,
    pub email: String,
    /// At least 8 characters
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session response. The same token is also set as the `session` cookie.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the session expires
    pub expires_in: i64,
    pub user: UserResponse,
}

/// User account DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    /// member or admin
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            role: u.role.as_str().to_string(),
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// Auth service state
#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<AuthService>,
    pub identity: IdentityService,
    pub cookie_secure: bool,
}

impl AuthState {
    fn start_session(&self, jar: CookieJar, identity: &UserIdentity, user: User) -> Result<(CookieJar, SessionResponse), PlatformError> {
        let session = self.auth_service.issue_session(identity)?;
        let jar = jar.add(self.session_cookie(&session));

        Ok((
            jar,
            SessionResponse {
                access_token: session.token.clone(),
                token_type: "Bearer".to_string(),
                expires_in: session.expires_in(),
                user: user.into(),
            },
        ))
    }

    fn session_cookie(&self, session: &IssuedSession) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, session.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(time::Duration::seconds(session.expires_in()))
            .build()
    }
}

/// Create a member account
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and session started", body = SessionResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, PlatformError> {
    let req = json_body(payload)?;

    let user = state
        .identity
        .signup(SignupCommand {
            full_name: req.full_name,
            email: req.email,
            password: req.password,
        })
        .await?;

    let identity = user.identity();
    let (jar, body) = state.start_session(jar, &identity, user)?;
    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, PlatformError> {
    let req = json_body(payload)?;

    let identity = state
        .identity
        .authenticate(&req.email, &req.password)
        .await?
        .ok_or(PlatformError::InvalidCredentials)?;
    let user = state.identity.current_user(&identity).await?;

    let (jar, body) = state.start_session(jar, &identity, user)?;
    Ok((jar, Json(body)))
}

/// Logout
///
/// Sessions are stateless; this only clears the cookie.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Logout successful")
    )
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (StatusCode::NO_CONTENT, jar)
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user info", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AuthState>,
    Authenticated(identity): Authenticated,
) -> ApiResult<UserResponse> {
    let user = state.identity.current_user(&identity).await?;
    Ok(Json(user.into()))
}

/// Create the auth router
pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .with_state(state)
}
