//! In-memory implementation of the store traits.
//!
//! Not durable. Each mutation runs under a single write lock, which gives the
//! supervisor compare-and-set the same atomicity the SQLite statement has.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewUser, OwnershipSource, StoreError, StoreResult, UserRecord, UserStore};
use crate::authz::{OwnedResource, ResourceKind};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    resources: RwLock<HashMap<(ResourceKind, Uuid), OwnedResource>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_resource(&self, resource: OwnedResource) {
        self.resources
            .write()
            .await
            .insert((resource.kind, resource.id), resource);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_name(&self, user_name: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.user_name == user_name)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.user_name == user.user_name) {
            return Err(StoreError::Conflict(format!("user name {} already exists", user.user_name)));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            user_name: user.user_name,
            email: user.email,
            password_hash: user.password_hash,
            roles: user.roles.into_iter().collect(),
            supervisor_id: None,
            force_relogin: false,
            created_at: Utc::now(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_force_relogin(&self, id: Uuid, force_relogin: bool) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("user not found".to_string()))?;
        user.force_relogin = force_relogin;
        Ok(())
    }

    async fn set_supervisor_if_unset(&self, id: Uuid, supervisor_id: Uuid) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("user not found".to_string()))?;
        if user.supervisor_id.is_some() {
            return Ok(false);
        }
        user.supervisor_id = Some(supervisor_id);
        Ok(true)
    }
}

#[async_trait]
impl OwnershipSource for MemoryStore {
    async fn find_owned(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<OwnedResource>> {
        Ok(self.resources.read().await.get(&(kind, id)).copied())
    }
}
