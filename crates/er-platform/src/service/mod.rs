//! Service Layer
//!
//! Business rules for the registration platform. Services take the caller's
//! `UserIdentity` as a plain argument and receive their datastore handles
//! through constructors.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{PlatformError, Result};

pub mod auth;
pub mod catalog;
pub mod checks;
pub mod identity;
pub mod password;
pub mod registration;

pub use auth::{AuthConfig, AuthService, IssuedSession, SessionClaims, extract_bearer_token};
pub use catalog::EventCatalogService;
pub use identity::{IdentityService, SignupCommand};
pub use password::{Argon2Config, PasswordService};
pub use registration::RegistrationService;

/// Run a datastore operation under a deadline.
///
/// On expiry the future is dropped, which rolls back any open transaction,
/// and the caller gets a retryable `TransientStore` error.
pub(crate) async fn bounded<T, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "Datastore operation timed out");
            Err(PlatformError::transient(format!(
                "{} timed out after {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
