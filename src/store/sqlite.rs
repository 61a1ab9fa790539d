use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{NewUser, OwnershipSource, StoreError, StoreResult, UserRecord, UserStore};
use crate::authz::{OwnedResource, ResourceKind};
use crate::db::row_parsers;

const USER_COLUMNS: &str = "id, user_name, email, password_hash, supervisor_id, force_relogin, created_at";

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_user(&self, row: Option<sqlx::sqlite::SqliteRow>) -> StoreResult<Option<UserRecord>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = sqlx::Row::try_get(&row, "id")?;
        let role_rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(&id)
            .fetch_all(&self.pool)
            .await?;
        let roles = row_parsers::roles_from_rows(&role_rows)?;

        row_parsers::user_from_row(&row, roles).map(Some)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.load_user(row).await
    }

    async fn find_by_name(&self, user_name: &str) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {} FROM users WHERE user_name = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_name)
            .fetch_optional(&self.pool)
            .await?;
        self.load_user(row).await
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (id, user_name, email, password_hash, supervisor_id, force_relogin, created_at) VALUES (?, ?, ?, ?, NULL, 0, ?)",
        )
        .bind(id.to_string())
        .bind(&user.user_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &inserted {
            if db_err.is_unique_violation() {
                return Err(StoreError::Conflict(format!("user name {} already exists", user.user_name)));
            }
        }
        inserted?;

        for role in &user.roles {
            sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(UserRecord {
            id,
            user_name: user.user_name,
            email: user.email,
            password_hash: user.password_hash,
            roles: user.roles.into_iter().collect(),
            supervisor_id: None,
            force_relogin: false,
            created_at: now,
        })
    }

    async fn set_force_relogin(&self, id: Uuid, force_relogin: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET force_relogin = ? WHERE id = ?")
            .bind(force_relogin)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        Ok(())
    }

    async fn set_supervisor_if_unset(&self, id: Uuid, supervisor_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET supervisor_id = ? WHERE id = ? AND supervisor_id IS NULL")
            .bind(supervisor_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Zero rows: either the user is gone or the supervisor was already set.
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        Ok(false)
    }
}

#[async_trait]
impl OwnershipSource for SqliteStore {
    async fn find_owned(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<OwnedResource>> {
        let sql = match kind {
            ResourceKind::Company => "SELECT id, user_id, NULL AS parent_id FROM companies WHERE id = ?",
            ResourceKind::Department => "SELECT id, user_id, company_id AS parent_id FROM departments WHERE id = ?",
            ResourceKind::Purchase => "SELECT id, user_id, department_id AS parent_id FROM purchases WHERE id = ?",
        };

        let row = sqlx::query(sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_parsers::owned_from_row(kind, &row)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use std::time::Duration;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn new_user(name: &str, roles: Vec<Role>) -> NewUser {
        NewUser {
            user_name: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            roles,
        }
    }

    #[tokio::test]
    async fn insert_and_find_with_roles() {
        let store = store().await;
        let created = store
            .insert(new_user("alice", vec![Role::BudgetUser, Role::CompanyManager]))
            .await
            .unwrap();

        let found = store.find_by_name("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.roles.contains(&Role::CompanyManager));
        assert!(found.roles.contains(&Role::BudgetUser));
        assert_eq!(store.find_by_id(created.id).await.unwrap().unwrap().user_name, "alice");
        assert!(store.find_by_name("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let store = store().await;
        store.insert(new_user("bob", vec![Role::BudgetUser])).await.unwrap();
        let err = store.insert(new_user("bob", vec![Role::BudgetUser])).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn supervisor_is_set_once() {
        let store = store().await;
        let sub = store.insert(new_user("sub", vec![Role::BudgetUser])).await.unwrap();
        let first = store.insert(new_user("boss", vec![Role::CompanyManager])).await.unwrap();
        let second = store.insert(new_user("other", vec![Role::CompanyManager])).await.unwrap();

        assert!(store.set_supervisor_if_unset(sub.id, first.id).await.unwrap());
        assert!(!store.set_supervisor_if_unset(sub.id, second.id).await.unwrap());
        let stored = store.find_by_id(sub.id).await.unwrap().unwrap();
        assert_eq!(stored.supervisor_id, Some(first.id));

        let err = store.set_supervisor_if_unset(Uuid::new_v4(), first.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_supervisor_writes_across_connections_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("race.db"))
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();
        let store = SqliteStore::new(pool);

        let sub = store.insert(new_user("sub", vec![Role::BudgetUser])).await.unwrap();
        let mut bosses = Vec::new();
        for i in 0..8 {
            bosses.push(store.insert(new_user(&format!("boss{i}"), vec![Role::CompanyManager])).await.unwrap().id);
        }

        let handles: Vec<_> = bosses
            .iter()
            .map(|&boss| {
                let store = store.clone();
                tokio::spawn(async move { store.set_supervisor_if_unset(sub.id, boss).await.unwrap() })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        let stored = store.find_by_id(sub.id).await.unwrap().unwrap();
        assert!(stored.supervisor_id.is_some_and(|id| bosses.contains(&id)));
    }

    #[tokio::test]
    async fn force_relogin_round_trips() {
        let store = store().await;
        let user = store.insert(new_user("carol", vec![Role::BudgetUser])).await.unwrap();
        store.set_force_relogin(user.id, true).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().unwrap().force_relogin);
        store.set_force_relogin(user.id, false).await.unwrap();
        assert!(!store.find_by_id(user.id).await.unwrap().unwrap().force_relogin);
    }

    #[tokio::test]
    async fn find_owned_reports_parent() {
        let store = store().await;
        let owner = store.insert(new_user("owner", vec![Role::CompanyManager])).await.unwrap();
        let (company_id, department_id) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO companies (id, user_id, name, established_date, created_at) VALUES (?, ?, 'Acme', ?, ?)")
            .bind(company_id.to_string())
            .bind(owner.id.to_string())
            .bind(&now)
            .bind(&now)
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO departments (id, company_id, user_id, name, created_at) VALUES (?, ?, ?, 'Ops', ?)")
            .bind(department_id.to_string())
            .bind(company_id.to_string())
            .bind(owner.id.to_string())
            .bind(&now)
            .execute(store.pool())
            .await
            .unwrap();

        let company = store.find_owned(ResourceKind::Company, company_id).await.unwrap().unwrap();
        assert_eq!(company.parent_id, None);
        assert!(company.is_owned_by(owner.id));

        let department = store
            .find_owned(ResourceKind::Department, department_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(department.parent_id, Some(company_id));

        assert!(store
            .find_owned(ResourceKind::Purchase, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
