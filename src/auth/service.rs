use std::sync::Arc;

use uuid::Uuid;

use super::credentials::{CredentialStore, PasswordCredentials};
use super::supervisor::{Assignment, SupervisorDirectory};
use super::AuthError;
use crate::authz::{Principal, Role};
use crate::jwt::{AccessClaims, TokenCodec};
use crate::models::user::{TokenPair, UserDto};
use crate::store::{StoreError, UserRecord, UserStore};

/// Registration, login/logout, token refresh and supervisor assignment.
///
/// Holds no mutable state of its own; every change goes through the store.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenCodec>,
    supervisors: SupervisorDirectory,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenCodec>) -> Self {
        let credentials = Arc::new(PasswordCredentials::new(users.clone()));
        Self::with_credentials(users, credentials, tokens)
    }

    pub fn with_credentials(
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<TokenCodec>,
    ) -> Self {
        Self {
            supervisors: SupervisorDirectory::new(users.clone()),
            users,
            credentials,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
        as_manager: bool,
    ) -> Result<UserDto, AuthError> {
        if self.users.find_by_name(user_name).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let record = self
            .credentials
            .create_account(user_name, email, password, Role::for_registration(as_manager))
            .await?;

        tracing::info!(user_id = %record.id, as_manager, "user registered");
        Ok(UserDto::from(&record))
    }

    pub async fn login(&self, user_name: &str, password: &str) -> Result<TokenPair, AuthError> {
        let record = match self.credentials.verify_password(user_name, password).await {
            Ok(record) => record,
            Err(AuthError::InvalidCredentials) => {
                tracing::warn!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err),
        };

        self.users
            .set_force_relogin(record.id, false)
            .await
            .map_err(unknown_if_missing)?;

        let pair = self.issue_pair(&record)?;
        tracing::info!(user_id = %record.id, "user logged in");
        Ok(pair)
    }

    /// Blocks every refresh until the next login. Access tokens already issued
    /// stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.users
            .set_force_relogin(user_id, true)
            .await
            .map_err(unknown_if_missing)?;
        tracing::info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.decode_refresh(refresh_token).map_err(|err| {
            tracing::warn!(error = %err, "refresh rejected");
            AuthError::Token(err)
        })?;

        let record = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if record.force_relogin {
            tracing::warn!(user_id = %record.id, "refresh rejected: forced relogin");
            return Err(AuthError::ForcedRelogin);
        }

        self.issue_pair(&record)
    }

    pub async fn assign_supervisor(&self, subordinate_name: &str, supervisor_name: &str) -> Result<(), AuthError> {
        let subordinate = self
            .users
            .find_by_name(subordinate_name)
            .await?
            .ok_or(AuthError::UnknownUser)?;
        let supervisor = self
            .users
            .find_by_name(supervisor_name)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if subordinate.id == supervisor.id {
            return Err(AuthError::InvalidSupervisor);
        }

        match self
            .supervisors
            .assign(subordinate.id, supervisor.id)
            .await
            .map_err(unknown_if_missing)?
        {
            Assignment::Ok => {
                tracing::info!(
                    subordinate_id = %subordinate.id,
                    supervisor_id = %supervisor.id,
                    "supervisor assigned"
                );
                Ok(())
            }
            Assignment::AlreadyAssigned => Err(AuthError::AlreadySupervised),
        }
    }

    /// Builds the request principal: identity and roles from the token,
    /// supervisor from the directory.
    pub async fn principal(&self, claims: &AccessClaims) -> Result<Principal, AuthError> {
        let supervisor_id = self
            .supervisors
            .lookup(claims.sub)
            .await
            .map_err(unknown_if_missing)?;

        Ok(Principal::new(claims.sub, claims.name.clone())
            .with_roles(claims.roles.iter().copied())
            .with_supervisor(supervisor_id))
    }

    fn issue_pair(&self, record: &UserRecord) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self
                .tokens
                .issue_access_token(&record.user_name, record.id, record.roles.iter().copied())?,
            refresh_token: self.tokens.issue_refresh_token(record.id)?,
        })
    }
}

fn unknown_if_missing(err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound(_) => AuthError::UnknownUser,
        other => AuthError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{JwtConfig, TokenError};
    use crate::store::memory::MemoryStore;

    fn service() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let tokens = Arc::new(TokenCodec::new(JwtConfig::new("service-test-secret")));
        (AuthService::new(store.clone(), tokens), store)
    }

    #[tokio::test]
    async fn register_assigns_roles() {
        let (auth, store) = service();
        let user = auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let manager = auth.register("grace", "grace@example.com", "password1", true).await.unwrap();

        let user = store.find_by_id(user.user_id).await.unwrap().unwrap();
        let manager = store.find_by_id(manager.user_id).await.unwrap().unwrap();
        assert_eq!(user.roles.len(), 1);
        assert!(user.roles.contains(&Role::BudgetUser));
        assert!(manager.roles.contains(&Role::CompanyManager));
        assert!(manager.roles.contains(&Role::BudgetUser));
    }

    #[tokio::test]
    async fn register_twice_is_username_taken() {
        let (auth, _) = service();
        auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let err = auth
            .register("ada", "other@example.com", "password2", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[tokio::test]
    async fn login_issues_tokens_with_current_roles() {
        let (auth, _) = service();
        let user = auth.register("grace", "grace@example.com", "password1", true).await.unwrap();
        let pair = auth.login("grace", "password1").await.unwrap();

        let claims = auth.tokens().decode_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user.user_id);
        assert_eq!(claims.name, "grace");
        assert!(claims.roles.contains(&Role::CompanyManager));
        assert_eq!(auth.tokens().decode_refresh(&pair.refresh_token).unwrap().sub, user.user_id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() {
        let (auth, _) = service();
        auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let wrong = auth.login("ada", "password2").await.unwrap_err();
        let unknown = auth.login("nobody", "password1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn logout_blocks_refresh_until_next_login() {
        let (auth, _) = service();
        let user = auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let pair = auth.login("ada", "password1").await.unwrap();

        auth.refresh(&pair.refresh_token).await.unwrap();
        auth.logout(user.user_id).await.unwrap();
        let err = auth.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::ForcedRelogin));

        let fresh = auth.login("ada", "password1").await.unwrap();
        auth.refresh(&fresh.refresh_token).await.unwrap();
        // the pre-logout token works again: only the flag is tracked
        auth.refresh(&pair.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_and_garbage() {
        let (auth, _) = service();
        auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let pair = auth.login("ada", "password1").await.unwrap();

        let err = auth.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::InvalidToken)));
        let err = auth.refresh("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Malformed)));
    }

    #[tokio::test]
    async fn refresh_for_vanished_subject_is_unknown_user() {
        let (auth, _) = service();
        let token = auth.tokens().issue_refresh_token(Uuid::new_v4()).unwrap();
        let err = auth.refresh(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
        let err = auth.logout(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }

    #[tokio::test]
    async fn supervisor_is_assigned_once() {
        let (auth, store) = service();
        let sub = auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let boss = auth.register("grace", "grace@example.com", "password1", true).await.unwrap();
        auth.register("linus", "linus@example.com", "password1", true).await.unwrap();

        auth.assign_supervisor("ada", "grace").await.unwrap();
        let err = auth.assign_supervisor("ada", "linus").await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadySupervised));

        let stored = store.find_by_id(sub.user_id).await.unwrap().unwrap();
        assert_eq!(stored.supervisor_id, Some(boss.user_id));
    }

    #[tokio::test]
    async fn supervisor_assignment_edge_cases() {
        let (auth, _) = service();
        auth.register("ada", "ada@example.com", "password1", false).await.unwrap();

        let err = auth.assign_supervisor("ada", "ada").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSupervisor));
        let err = auth.assign_supervisor("ada", "nobody").await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
        let err = auth.assign_supervisor("nobody", "ada").await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }

    #[tokio::test]
    async fn principal_reflects_store_state() {
        let (auth, _) = service();
        let sub = auth.register("ada", "ada@example.com", "password1", false).await.unwrap();
        let boss = auth.register("grace", "grace@example.com", "password1", true).await.unwrap();
        let pair = auth.login("ada", "password1").await.unwrap();
        auth.assign_supervisor("ada", "grace").await.unwrap();

        let claims = auth.tokens().decode_access(&pair.access_token).unwrap();
        let principal = auth.principal(&claims).await.unwrap();
        assert_eq!(principal.user_id, sub.user_id);
        assert!(principal.is_supervised_by(boss.user_id));
        assert!(principal.has_role(Role::BudgetUser));
        assert_eq!(principal.user_name, "ada");
    }

    #[tokio::test]
    async fn principal_for_vanished_subject_is_unknown_user() {
        let (auth, _) = service();
        let token = auth
            .tokens()
            .issue_access_token("ghost", Uuid::new_v4(), [Role::BudgetUser])
            .unwrap();
        let claims = auth.tokens().decode_access(&token).unwrap();
        let err = auth.principal(&claims).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }
}
