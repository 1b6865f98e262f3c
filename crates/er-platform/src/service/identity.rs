//! Identity Service
//!
//! Account signup and credential checks. Argon2 work runs on the blocking
//! pool so it never stalls the async workers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{NewUser, User, UserIdentity, UserRole};
use crate::error::{PlatformError, Result};
use crate::repository::UserRepository;
use crate::service::{bounded, PasswordService};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct SignupCommand {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    passwords: PasswordService,
    timeout: Duration,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UserRepository>, passwords: PasswordService, timeout: Duration) -> Self {
        Self {
            users,
            passwords,
            timeout,
        }
    }

    /// Create a member account. Signup never grants the admin role.
    pub async fn signup(&self, cmd: SignupCommand) -> Result<User> {
        self.create_user(cmd, UserRole::Member).await
    }

    /// Create an account with an explicit role, used by provisioning and seeding.
    pub async fn create_user(&self, cmd: SignupCommand, role: UserRole) -> Result<User> {
        let full_name = cmd.full_name.trim().to_string();
        let email = normalize_email(&cmd.email);

        if full_name.is_empty() {
            return Err(PlatformError::validation("fullName is required"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(PlatformError::validation("A valid email is required"));
        }
        if cmd.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(PlatformError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let password_hash = self.hash_blocking(cmd.password).await?;
        let user = bounded(
            self.timeout,
            "create_user",
            self.users.insert(NewUser {
                email,
                password_hash,
                full_name,
                role,
            }),
        )
        .await?;

        info!(user_id = user.id, role = user.role.as_str(), "User account created");
        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<UserIdentity>> {
        let email = normalize_email(email);
        let Some(user) = bounded(self.timeout, "authenticate", self.users.find_by_email(&email)).await? else {
            return Ok(None);
        };

        let passwords = self.passwords.clone();
        let password = password.to_string();
        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || passwords.verify_password(&password, &hash))
            .await
            .map_err(|e| PlatformError::internal(format!("Password verification task failed: {}", e)))??;

        if !valid {
            warn!(user_id = user.id, "Failed login attempt");
            return Ok(None);
        }
        Ok(Some(user.identity()))
    }

    /// Resolve a verified identity back to its stored account.
    pub async fn current_user(&self, identity: &UserIdentity) -> Result<User> {
        bounded(self.timeout, "current_user", self.users.find_by_id(identity.id))
            .await?
            .ok_or_else(|| PlatformError::unauthorized("Account no longer exists"))
    }

    pub async fn user_count(&self) -> Result<i64> {
        bounded(self.timeout, "user_count", self.users.count()).await
    }

    async fn hash_blocking(&self, password: String) -> Result<String> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash_password(&password))
            .await
            .map_err(|e| PlatformError::internal(format!("Password hashing task failed: {}", e)))?
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use crate::service::Argon2Config;

    fn service() -> IdentityService {
        let passwords = PasswordService::new(Argon2Config {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        IdentityService::new(Arc::new(MemoryStore::new()), passwords, Duration::from_secs(5))
    }

    fn signup(email: &str, password: &str) -> SignupCommand {
        SignupCommand {
            full_name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_authenticate() {
        let identity = service();
        let user = identity.signup(signup("Ada@Example.com", "analytical")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, UserRole::Member);

        let found = identity.authenticate("ada@example.com", "analytical").await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(user.id));

        assert!(identity.authenticate("ada@example.com", "wrong-pass").await.unwrap().is_none());
        assert!(identity.authenticate("nobody@example.com", "analytical").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let err = service().signup(signup("a@example.com", "short")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let identity = service();
        identity.signup(signup("a@example.com", "password1")).await.unwrap();
        let err = identity.signup(signup("A@example.com", "password2")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Duplicate { .. }));
    }
}
