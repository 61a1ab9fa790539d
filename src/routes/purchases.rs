use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, purchase_approved, Action, OwnershipResolver, Target};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::purchase::{Purchase, PurchaseWriteRequest};

const PURCHASE_COLUMNS: &str =
    "id, department_id, user_id, name, approved, amount, cost, purchase_date, created_at";

#[utoipa::path(
    get,
    path = "/api/v1/companies/{company_id}/departments/{department_id}/purchases",
    tag = "Purchases",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id")
    ),
    responses(
        (status = 200, description = "Purchases of the department", body = [Purchase]),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company or department not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<Purchase>>> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .department(company_id, department_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Read, &Target::purchases(chain))?;

    let sql = format!(
        "SELECT {} FROM purchases WHERE department_id = ? ORDER BY created_at",
        PURCHASE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(department_id.to_string())
        .fetch_all(&state.pool)
        .await?;

    let purchases = rows
        .iter()
        .map(row_parsers::purchase_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(purchases))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/{company_id}/departments/{department_id}/purchases",
    tag = "Purchases",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id")
    ),
    request_body = PurchaseWriteRequest,
    responses(
        (status = 201, description = "Purchase created", body = Purchase),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company or department not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<PurchaseWriteRequest>,
) -> AppResult<(StatusCode, Json<Purchase>)> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .department(company_id, department_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Create, &Target::purchases(chain))?;
    payload.validate()?;

    let id = Uuid::new_v4();
    let approved = purchase_approved(&auth.principal);
    sqlx::query(
        "INSERT INTO purchases (id, department_id, user_id, name, approved, amount, cost, purchase_date, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(department_id.to_string())
    .bind(auth.principal.user_id.to_string())
    .bind(payload.name.trim())
    .bind(approved)
    .bind(payload.amount)
    .bind(payload.cost)
    .bind(payload.purchase_date.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(&state.pool)
    .await?;

    tracing::info!(purchase_id = %id, department_id = %department_id, approved, "purchase created");
    let purchase = fetch_purchase(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/{company_id}/departments/{department_id}/purchases/{purchase_id}",
    tag = "Purchases",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id"),
        ("purchase_id" = Uuid, Path, description = "Purchase id")
    ),
    responses(
        (status = 200, description = "Purchase", body = Purchase),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company, department or purchase not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id, purchase_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<Purchase>> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .purchase(company_id, department_id, purchase_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Read, &Target::purchase(chain))?;

    Ok(Json(fetch_purchase(&state.pool, purchase_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/companies/{company_id}/departments/{department_id}/purchases/{purchase_id}",
    tag = "Purchases",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id"),
        ("purchase_id" = Uuid, Path, description = "Purchase id")
    ),
    request_body = PurchaseWriteRequest,
    responses(
        (status = 200, description = "Purchase updated", body = Purchase),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company, department or purchase not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id, purchase_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<PurchaseWriteRequest>,
) -> AppResult<Json<Purchase>> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .purchase(company_id, department_id, purchase_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Update, &Target::purchase(chain))?;
    payload.validate()?;

    // approval follows the latest writer
    sqlx::query(
        "UPDATE purchases SET name = ?, approved = ?, amount = ?, cost = ?, purchase_date = ? WHERE id = ?",
    )
    .bind(payload.name.trim())
    .bind(purchase_approved(&auth.principal))
    .bind(payload.amount)
    .bind(payload.cost)
    .bind(payload.purchase_date.to_rfc3339())
    .bind(purchase_id.to_string())
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_purchase(&state.pool, purchase_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/{company_id}/departments/{department_id}/purchases/{purchase_id}",
    tag = "Purchases",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("department_id" = Uuid, Path, description = "Department id"),
        ("purchase_id" = Uuid, Path, description = "Purchase id")
    ),
    responses(
        (status = 204, description = "Purchase deleted"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Company, department or purchase not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((company_id, department_id, purchase_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let chain = OwnershipResolver::new(state.store.as_ref())
        .purchase(company_id, department_id, purchase_id)
        .await?;
    authz::require(state.policy.as_ref(), &auth.principal, Action::Delete, &Target::purchase(chain))?;

    sqlx::query("DELETE FROM purchases WHERE id = ?")
        .bind(purchase_id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_purchase(pool: &SqlitePool, purchase_id: Uuid) -> AppResult<Purchase> {
    let sql = format!("SELECT {} FROM purchases WHERE id = ?", PURCHASE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(purchase_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("purchase not found"))?;

    Ok(row_parsers::purchase_from_row(&row)?)
}
