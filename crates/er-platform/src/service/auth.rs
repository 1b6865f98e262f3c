//! Session Tokens
//!
//! HS256 JWTs carrying the user id, email and role. Verification failures of
//! any kind (bad signature, expiry, foreign issuer, unknown role) all collapse
//! to "no session".

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{UserIdentity, UserRole};
use crate::error::{PlatformError, Result};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: String,
    pub session_ttl: Duration,
}

impl From<&er_config::AuthSettings> for AuthConfig {
    fn from(settings: &er_config::AuthSettings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            issuer: settings.issuer.clone(),
            session_ttl: Duration::seconds(
                settings.session_ttl_secs.clamp(1, er_config::MAX_SESSION_TTL_SECS),
            ),
        }
    }
}

/// JWT claims of a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// A freshly signed session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedSession {
    /// Seconds until expiry, for the `Max-Age` of the session cookie
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.config.session_ttl
    }

    pub fn issue_session(&self, identity: &UserIdentity) -> Result<IssuedSession> {
        self.issue_session_at(identity, Utc::now())
    }

    pub(crate) fn issue_session_at(&self, identity: &UserIdentity, now: DateTime<Utc>) -> Result<IssuedSession> {
        let expires_at = now
            .checked_add_signed(self.config.session_ttl)
            .ok_or_else(|| PlatformError::internal("Session expiry out of range"))?;
        let claims = SessionClaims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PlatformError::internal(format!("Failed to sign session: {}", e)))?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Decode a token into the identity it was issued for.
    pub fn verify_session(&self, token: &str) -> Option<UserIdentity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let claims = match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Session token rejected");
                return None;
            }
        };

        let id = claims.sub.parse().ok()?;
        let role = claims.role.parse::<UserRole>().ok()?;
        Some(UserIdentity {
            id,
            email: claims.email,
            role,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(issuer: &str) -> AuthService {
        AuthService::new(AuthConfig {
            secret: "test-secret-with-enough-length".to_string(),
            issuer: issuer.to_string(),
            session_ttl: Duration::days(7),
        })
    }

    fn admin() -> UserIdentity {
        UserIdentity {
            id: 12,
            email: "admin@example.com".to_string(),
            role: UserRole::Admin,
        }
    }

    #[test]
    fn test_oversized_ttl_setting_is_capped() {
        let settings = er_config::AuthSettings {
            session_ttl_secs: i64::MAX,
            ..er_config::AuthSettings::default()
        };
        let config = AuthConfig::from(&settings);
        assert_eq!(config.session_ttl, Duration::seconds(er_config::MAX_SESSION_TTL_SECS));

        let service = AuthService::new(config);
        let session = service.issue_session(&admin()).unwrap();
        assert!(service.verify_session(&session.token).is_some());
    }

    #[test]
    fn test_issue_and_verify() {
        let auth = service("event-registration");
        let session = auth.issue_session(&admin()).unwrap();

        assert_eq!(auth.verify_session(&session.token), Some(admin()));
        assert!(session.expires_in() > 6 * 24 * 3600);
    }

    #[test]
    fn test_expired_session_is_none() {
        let auth = service("event-registration");
        let session = auth
            .issue_session_at(&admin(), Utc::now() - Duration::days(8))
            .unwrap();
        assert_eq!(auth.verify_session(&session.token), None);
    }

    #[test]
    fn test_foreign_issuer_is_none() {
        let session = service("someone-else").issue_session(&admin()).unwrap();
        assert_eq!(service("event-registration").verify_session(&session.token), None);
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(service("event-registration").verify_session("not.a.jwt"), None);
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
