use thiserror::Error;

use crate::jwt::TokenError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Same message for an unknown user name and a wrong password.
    #[error("username or password was incorrect")]
    InvalidCredentials,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("account rejected: {0}")]
    AccountRejected(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("session was closed, log in again")]
    ForcedRelogin,
    #[error("user does not exist")]
    UnknownUser,
    #[error("user already has a supervisor")]
    AlreadySupervised,
    #[error("a user cannot supervise themself")]
    InvalidSupervisor,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
