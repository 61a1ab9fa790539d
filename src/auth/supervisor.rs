use std::sync::Arc;

use uuid::Uuid;

use crate::store::{StoreError, StoreResult, UserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Ok,
    AlreadyAssigned,
}

/// One-time subordinate to supervisor binding.
///
/// Once set, a supervisor is never replaced. The store performs the write as a
/// single compare-and-set, so two racing assignments cannot both succeed.
#[derive(Clone)]
pub struct SupervisorDirectory {
    users: Arc<dyn UserStore>,
}

impl SupervisorDirectory {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn assign(&self, subordinate_id: Uuid, supervisor_id: Uuid) -> StoreResult<Assignment> {
        let written = self
            .users
            .set_supervisor_if_unset(subordinate_id, supervisor_id)
            .await?;
        Ok(if written {
            Assignment::Ok
        } else {
            Assignment::AlreadyAssigned
        })
    }

    /// `NotFound` when the subordinate itself does not exist.
    pub async fn lookup(&self, subordinate_id: Uuid) -> StoreResult<Option<Uuid>> {
        self.users
            .find_by_id(subordinate_id)
            .await?
            .map(|user| user.supervisor_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {subordinate_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::store::memory::MemoryStore;
    use crate::store::NewUser;

    async fn user(store: &MemoryStore, name: &str) -> Uuid {
        store
            .insert(NewUser {
                user_name: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "x".to_string(),
                roles: vec![Role::BudgetUser],
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn second_assignment_is_refused_and_state_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let (sub, first, second) = (
            user(&store, "sub").await,
            user(&store, "first").await,
            user(&store, "second").await,
        );
        let directory = SupervisorDirectory::new(store.clone());

        assert_eq!(directory.lookup(sub).await.unwrap(), None);
        assert_eq!(directory.assign(sub, first).await.unwrap(), Assignment::Ok);
        assert_eq!(directory.assign(sub, second).await.unwrap(), Assignment::AlreadyAssigned);
        assert_eq!(directory.lookup(sub).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn lookup_of_missing_subordinate_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let directory = SupervisorDirectory::new(store);
        let err = directory.lookup(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_assignments_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let sub = user(&store, "sub").await;
        let mut supervisors = Vec::new();
        for i in 0..8 {
            supervisors.push(user(&store, &format!("boss{i}")).await);
        }
        let directory = SupervisorDirectory::new(store.clone());

        let handles: Vec<_> = supervisors
            .iter()
            .map(|&boss| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.assign(sub, boss).await.unwrap() })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() == Assignment::Ok {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        let winner = directory.lookup(sub).await.unwrap().unwrap();
        assert!(supervisors.contains(&winner));
    }
}
