//! Admin account bootstrap, shared by the server binary and the CLI.

use uuid::Uuid;

use super::{AuthError, CredentialStore};
use crate::authz::Role;
use crate::store::UserStore;

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

#[derive(Clone)]
pub struct AdminSeed {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AdminSeed {
    /// `None` when `ADMIN_PASSWORD` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let password = std::env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty())?;
        Some(Self {
            user_name: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| DEFAULT_ADMIN_USERNAME.to_string()),
            email: std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string()),
            password,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created(Uuid),
    AlreadyPresent(Uuid),
}

/// Creates the admin account holding every role, unless the name exists.
pub async fn seed_admin(
    users: &dyn UserStore,
    credentials: &dyn CredentialStore,
    seed: &AdminSeed,
) -> Result<SeedOutcome, AuthError> {
    if let Some(existing) = users.find_by_name(&seed.user_name).await? {
        tracing::info!(user_id = %existing.id, "admin account already present");
        return Ok(SeedOutcome::AlreadyPresent(existing.id));
    }

    let record = credentials
        .create_account(&seed.user_name, &seed.email, &seed.password, Role::ALL.to_vec())
        .await?;
    tracing::info!(user_id = %record.id, "admin account created");
    Ok(SeedOutcome::Created(record.id))
}
