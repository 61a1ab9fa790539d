use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Action, OwnershipResolver, Target};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::department::{Department, DepartmentWriteRequest};

const DEPARTMENT_COLUMNS: &str = "id, company_id, user_id, name, created_at";

#[utoipa::path(
    get,
    path = "/api/v1/companies/{company_id}/departments",
    tag = "Departments",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Departments of the company", body = [Department]),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_departments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<Department>>> {
    let chain = OwnershipResolver::new(state.store.as_ref()).company(company_id).await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Read, &Target::departments(chain))?;

    let sql = format!(
        "SELECT {} FROM departments WHERE company_id = ? ORDER BY created_at",
        DEPARTMENT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(company_id.to_string())
        .fetch_all(&state.pool)
        .await?;

    let departments = rows
        .iter()
        .map(row_parsers::department_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(departments))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/{company_id}/departments",
    tag = "Departments",
    params(("company_id" = Uuid, Path, description = "Company id")),
    request_body = DepartmentWriteRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<DepartmentWriteRequest>,
) -> AppResult<(StatusCode, Json<Department>)> {
    let chain = OwnershipResolver::new(state.store.as_ref()).company(company_id).await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Create, &Target::departments(chain))?;
    payload.validate()?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO departments (id, company_id, user_id, name, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(company_id.to_string())
        .bind(auth.principal.user_id.to_string())
        .bind(payload.name.trim())
        .bind(Utc::now().to_rfc3339())
        .execute(&state.pool)
        .await?;

    tracing::info!(department_id = %id, company_id = %company_id, "department created");
    let department = fetch_department(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/{company_id}/departments/{department_id}",
    tag = "Departments",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id")
    ),
    responses(
        (status = 200, description = "Department", body = Department),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company or department not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Department>> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .department(company_id, department_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Read, &Target::department(chain))?;

    Ok(Json(fetch_department(&state.pool, department_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/companies/{company_id}/departments/{department_id}",
    tag = "Departments",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id")
    ),
    request_body = DepartmentWriteRequest,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company or department not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DepartmentWriteRequest>,
) -> AppResult<Json<Department>> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .department(company_id, department_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Update, &Target::department(chain))?;
    payload.validate()?;

    sqlx::query("UPDATE departments SET name = ? WHERE id = ?")
        .bind(payload.name.trim())
        .bind(department_id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(Json(fetch_department(&state.pool, department_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/{company_id}/departments/{department_id}",
    tag = "Departments",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id")
    ),
    responses(
        (status = 204, description = "Department deleted with its purchases"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company or department not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .department(company_id, department_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Delete, &Target::department(chain))?;

    sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(department_id = %department_id, "department deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_department(pool: &SqlitePool, department_id: Uuid) -> AppResult<Department> {
    let sql = format!("SELECT {} FROM departments WHERE id = ?", DEPARTMENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(department_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("department not found"))?;

    Ok(row_parsers::department_from_row(&row)?)
}
