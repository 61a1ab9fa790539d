//! Persistence collaborators.
//!
//! The auth core talks to storage only through [`UserStore`] and
//! [`OwnershipSource`]. `sqlite` backs the running service; `memory` backs
//! unit tests and local experiments.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::authz::{OwnedResource, ResourceKind, Role};

pub mod memory;
pub mod sqlite;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: HashSet<Role>,
    pub supervisor_id: Option<Uuid>,
    pub force_relogin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;
    async fn find_by_name(&self, user_name: &str) -> StoreResult<Option<UserRecord>>;
    /// Fails with `Conflict` when the user name is taken.
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord>;
    async fn set_force_relogin(&self, id: Uuid, force_relogin: bool) -> StoreResult<()>;
    /// Atomic compare-and-set: writes `supervisor_id` only while it is unset.
    /// Returns `false` when a supervisor was already recorded.
    async fn set_supervisor_if_unset(&self, id: Uuid, supervisor_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait OwnershipSource: Send + Sync {
    async fn find_owned(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<OwnedResource>>;
}
