use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::authz::{DefaultPolicyEvaluator, PolicyEvaluator};
use crate::errors::AppError;
use crate::jwt::{JwtConfig, TokenCodec};
use crate::routes::{auth, companies, departments, health, purchases};
use crate::store::SqliteStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<TokenCodec>,
    pub store: Arc<SqliteStore>,
    pub auth: Arc<AuthService>,
    pub policy: Arc<dyn PolicyEvaluator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        let jwt = Arc::new(TokenCodec::new(jwt));
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let auth = Arc::new(AuthService::new(store.clone(), jwt.clone()));

        Self {
            pool,
            jwt,
            store,
            auth,
            policy: Arc::new(DefaultPolicyEvaluator::new()),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    Ok(create_app_with_config(pool, jwt_config))
}

pub fn create_app_with_config(pool: SqlitePool, jwt_config: JwtConfig) -> Router {
    router(AppState::new(pool, jwt_config))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/registerManager", post(auth::register_manager))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/accessToken", post(auth::refresh))
        .route("/supervise/:username", put(auth::supervise))
        .route("/me", get(auth::me));

    let company_routes = Router::new()
        .route("/", get(companies::list_companies).post(companies::create_company))
        .route(
            "/:company_id",
            get(companies::get_company)
                .put(companies::update_company)
                .delete(companies::delete_company),
        );

    // Departments are scoped to a company: /companies/:company_id/departments
    let department_routes = Router::new()
        .route("/", get(departments::list_departments).post(departments::create_department))
        .route(
            "/:department_id",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        );

    let purchase_routes = Router::new()
        .route("/", get(purchases::list_purchases).post(purchases::create_purchase))
        .route(
            "/:purchase_id",
            get(purchases::get_purchase)
                .put(purchases::update_purchase)
                .delete(purchases::delete_purchase),
        );

    let api = Router::new()
        .merge(auth_routes)
        .nest("/companies", company_routes)
        .nest("/companies/:company_id/departments", department_routes)
        .nest(
            "/companies/:company_id/departments/:department_id/purchases",
            purchase_routes,
        );

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
