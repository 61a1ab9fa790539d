use std::sync::{Arc, OnceLock};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand_core::OsRng;

use super::AuthError;
use crate::authz::Role;
use crate::store::{NewUser, StoreError, UserRecord, UserStore};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Verified against when the name is unknown, so both failure paths pay for
/// one Argon2 run.
static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Account creation and password checks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_account(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
        roles: Vec<Role>,
    ) -> Result<UserRecord, AuthError>;

    /// `InvalidCredentials` for both an unknown name and a wrong password.
    async fn verify_password(&self, user_name: &str, password: &str) -> Result<UserRecord, AuthError>;
}

/// Argon2 hashes kept in the user table.
#[derive(Clone)]
pub struct PasswordCredentials {
    users: Arc<dyn UserStore>,
    verifier: Arc<dyn PasswordVerifier + Send + Sync>,
}

impl PasswordCredentials {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self::with_verifier(users, Arc::new(Argon2::default()))
    }

    pub fn with_verifier(users: Arc<dyn UserStore>, verifier: Arc<dyn PasswordVerifier + Send + Sync>) -> Self {
        Self { users, verifier }
    }
}

#[async_trait]
impl CredentialStore for PasswordCredentials {
    async fn create_account(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
        roles: Vec<Role>,
    ) -> Result<UserRecord, AuthError> {
        if user_name.trim().is_empty() {
            return Err(AuthError::AccountRejected("username must not be empty".to_string()));
        }
        if email.trim().is_empty() {
            return Err(AuthError::AccountRejected("email must not be empty".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::AccountRejected(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let password_hash = hash_password(password)?;
        let new_user = NewUser {
            user_name: user_name.to_string(),
            email: email.to_string(),
            password_hash,
            roles,
        };

        match self.users.insert(new_user).await {
            Ok(record) => Ok(record),
            Err(StoreError::Conflict(_)) => Err(AuthError::UsernameTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn verify_password(&self, user_name: &str, password: &str) -> Result<UserRecord, AuthError> {
        let record = self.users.find_by_name(user_name).await?;
        let stored_hash = match &record {
            Some(record) => record.password_hash.as_str(),
            None => dummy_hash()?,
        };

        let parsed_hash = PasswordHash::new(stored_hash)
            .map_err(|err| AuthError::Hashing(format!("invalid password hash: {err}")))?;
        let matches = self
            .verifier
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();

        match record {
            Some(record) if matches => Ok(record),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

fn dummy_hash() -> Result<&'static str, AuthError> {
    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash);
    }
    let hash = hash_password("unused placeholder password")?;
    Ok(DUMMY_HASH.get_or_init(|| hash))
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}
