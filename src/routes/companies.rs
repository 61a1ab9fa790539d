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
use crate::models::company::{Company, CompanyWriteRequest};

const COMPANY_COLUMNS: &str = "id, user_id, name, established_date, created_at";

#[utoipa::path(
    get,
    path = "/api/v1/companies",
    tag = "Companies",
    responses(
        (status = 200, description = "All companies", body = [Company]),
        (status = 403, description = "Only admins list every company")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_companies(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Company>>> {
    authz::require(state.policy.as_ref(), &auth.principal, Action::Read, &Target::companies())?;

    let sql = format!("SELECT {} FROM companies ORDER BY created_at", COMPANY_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(&state.pool).await?;

    let companies = rows
        .iter()
        .map(row_parsers::company_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(companies))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies",
    tag = "Companies",
    request_body = CompanyWriteRequest,
    responses(
        (status = 201, description = "Company created", body = Company),
        (status = 403, description = "Caller is not a company manager"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CompanyWriteRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    authz::require(state.policy.as_ref(), &auth.principal, Action::Create, &Target::companies())?;
    payload.validate()?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO companies (id, user_id, name, established_date, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(auth.principal.user_id.to_string())
        .bind(payload.name.trim())
        .bind(payload.established_date.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&state.pool)
        .await?;

    tracing::info!(company_id = %id, user_id = %auth.principal.user_id, "company created");
    let company = fetch_company(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/{company_id}",
    tag = "Companies",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company", body = Company),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    let chain = OwnershipResolver::new(state.store.as_ref()).company(company_id).await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Read, &Target::company(chain))?;

    Ok(Json(fetch_company(&state.pool, company_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/companies/{company_id}",
    tag = "Companies",
    params(("company_id" = Uuid, Path, description = "Company id")),
    request_body = CompanyWriteRequest,
    responses(
        (status = 200, description = "Company updated", body = Company),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<CompanyWriteRequest>,
) -> AppResult<Json<Company>> {
    let chain = OwnershipResolver::new(state.store.as_ref()).company(company_id).await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Update, &Target::company(chain))?;
    payload.validate()?;

    sqlx::query("UPDATE companies SET name = ?, established_date = ? WHERE id = ?")
        .bind(payload.name.trim())
        .bind(payload.established_date.to_rfc3339())
        .bind(company_id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(Json(fetch_company(&state.pool, company_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/{company_id}",
    tag = "Companies",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 204, description = "Company deleted with its departments and purchases"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let chain = OwnershipResolver::new(state.store.as_ref()).company(company_id).await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Delete, &Target::company(chain))?;

    sqlx::query("DELETE FROM companies WHERE id = ?")
        .bind(company_id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(company_id = %company_id, user_id = %auth.principal.user_id, "company deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_company(pool: &SqlitePool, company_id: Uuid) -> AppResult<Company> {
    let sql = format!("SELECT {} FROM companies WHERE id = ?", COMPANY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(company_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("company not found"))?;

    Ok(row_parsers::company_from_row(&row)?)
}
