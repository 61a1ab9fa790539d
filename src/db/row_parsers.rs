use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::authz::{OwnedResource, ResourceKind, Role};
use crate::models::{company::Company, department::Department, purchase::Purchase};
use crate::store::{StoreError, StoreResult, UserRecord};

pub fn parse_datetime(s: &str) -> StoreResult<DateTime<Utc>> {
    let s = s.trim();

    // RFC3339 is what we write (e.g. 2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" (with optional fractional seconds)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| StoreError::Corrupt("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(StoreError::Corrupt(format!("invalid datetime: {}", s)))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("missing {}: {}", name, e)))
}

fn uuid_column(row: &SqliteRow, name: &str) -> StoreResult<Uuid> {
    let raw: String = column(row, name)?;
    Uuid::parse_str(&raw).map_err(|e| StoreError::Corrupt(format!("invalid uuid in {}: {}", name, e)))
}

fn opt_uuid_column(row: &SqliteRow, name: &str) -> StoreResult<Option<Uuid>> {
    let raw: Option<String> = column(row, name)?;
    raw.map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("invalid uuid in {}: {}", name, e)))
}

fn datetime_column(row: &SqliteRow, name: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = column(row, name)?;
    parse_datetime(&raw)
}

pub fn roles_from_rows(rows: &[SqliteRow]) -> StoreResult<HashSet<Role>> {
    rows.iter()
        .map(|row| {
            let name: String = column(row, "role")?;
            name.parse::<Role>().map_err(|e| StoreError::Corrupt(e.to_string()))
        })
        .collect()
}

pub fn user_from_row(row: &SqliteRow, roles: HashSet<Role>) -> StoreResult<UserRecord> {
    Ok(UserRecord {
        id: uuid_column(row, "id")?,
        user_name: column(row, "user_name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        roles,
        supervisor_id: opt_uuid_column(row, "supervisor_id")?,
        force_relogin: column(row, "force_relogin")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

/// Expects `id`, `user_id` and a `parent_id` alias (NULL for companies).
pub fn owned_from_row(kind: ResourceKind, row: &SqliteRow) -> StoreResult<OwnedResource> {
    Ok(OwnedResource {
        kind,
        id: uuid_column(row, "id")?,
        owner_user_id: uuid_column(row, "user_id")?,
        parent_id: opt_uuid_column(row, "parent_id")?,
    })
}

pub fn company_from_row(row: &SqliteRow) -> StoreResult<Company> {
    Ok(Company {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        name: column(row, "name")?,
        established_date: datetime_column(row, "established_date")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

pub fn department_from_row(row: &SqliteRow) -> StoreResult<Department> {
    Ok(Department {
        id: uuid_column(row, "id")?,
        company_id: uuid_column(row, "company_id")?,
        user_id: uuid_column(row, "user_id")?,
        name: column(row, "name")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

pub fn purchase_from_row(row: &SqliteRow) -> StoreResult<Purchase> {
    Ok(Purchase {
        id: uuid_column(row, "id")?,
        department_id: uuid_column(row, "department_id")?,
        user_id: uuid_column(row, "user_id")?,
        name: column(row, "name")?,
        approved: column(row, "approved")?,
        amount: column(row, "amount")?,
        cost: column(row, "cost")?,
        purchase_date: datetime_column(row, "purchase_date")?,
        created_at: datetime_column(row, "created_at")?,
    })
}
