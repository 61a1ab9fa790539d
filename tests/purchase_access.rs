use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use budget_builder::auth::seed::{seed_admin, AdminSeed};
use budget_builder::auth::PasswordCredentials;
use budget_builder::create_app_with_config;
use budget_builder::jwt::JwtConfig;
use budget_builder::store::SqliteStore;

struct TestApp {
    app: Router,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Result<Self> {
        let dir = tempdir().context("failed to create tempdir")?;
        let opts = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
            .await?;
        migrator.run(&pool).await?;

        let store = Arc::new(SqliteStore::new(pool.clone()));
        let credentials = PasswordCredentials::new(store.clone());
        let admin = AdminSeed {
            user_name: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "rootpassword".to_string(),
        };
        seed_admin(store.as_ref(), &credentials, &admin).await?;

        let app = create_app_with_config(pool, JwtConfig::new("purchase-access-secret"));
        Ok(Self { app, _dir: dir })
    }

    async fn send(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn anonymous(&self, method: &str, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    /// Registers (unless it is the seeded admin) and returns an access token.
    async fn user(&self, username: &str, manager: bool) -> Result<String> {
        let path = if manager { "/api/v1/registerManager" } else { "/api/v1/register" };
        let (status, body) = self
            .anonymous(
                "POST",
                path,
                json!({ "username": username, "email": format!("{username}@example.com"), "password": "password123" }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        self.login(username, "password123").await
    }

    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .anonymous("POST", "/api/v1/login", json!({ "username": username, "password": password }))
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        Ok(body["accessToken"].as_str().context("missing accessToken")?.to_string())
    }
}

fn id_of(value: &Value) -> Result<String> {
    Ok(value["id"].as_str().with_context(|| format!("missing id in {value}"))?.to_string())
}

fn purchase(name: &str, amount: i64) -> Value {
    json!({ "name": name, "amount": amount, "cost": 12.5, "purchaseDate": "2024-03-01T00:00:00Z" })
}

/// Manager `grace` with one company and one department.
async fn company_with_department(t: &TestApp) -> Result<(String, String, String)> {
    let manager = t.user("grace", true).await?;

    let (status, company) = t
        .send(
            "POST",
            "/api/v1/companies",
            &manager,
            Some(json!({ "name": "Acme", "establishedDate": "2020-01-01T00:00:00Z" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{company}");
    let company_id = id_of(&company)?;

    let (status, department) = t
        .send(
            "POST",
            &format!("/api/v1/companies/{company_id}/departments"),
            &manager,
            Some(json!({ "name": "Operations" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{department}");

    Ok((manager, company_id, id_of(&department)?))
}

#[tokio::test]
async fn supervised_user_can_create_and_read_purchases() -> Result<()> {
    let t = TestApp::new().await?;
    let (manager, company_id, department_id) = company_with_department(&t).await?;
    let purchases = format!("/api/v1/companies/{company_id}/departments/{department_id}/purchases");

    let user = t.user("ada", false).await?;
    let (status, body) = t.send("POST", &purchases, &user, Some(purchase("Chairs", 4))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "unsupervised create: {body}");
    let (status, _) = t.send("GET", &purchases, &user, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = t.login("root", "rootpassword").await?;
    let (status, body) = t
        .send("PUT", "/api/v1/supervise/ada", &admin, Some(json!({ "supervisor": "grace" })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    // the existing access token picks up the new supervisor
    let (status, created) = t.send("POST", &purchases, &user, Some(purchase("Chairs", 4))).await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["approved"], false);
    assert_eq!(created["amount"], 4);

    let (status, by_manager) = t.send("POST", &purchases, &manager, Some(purchase("Desks", 2))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(by_manager["approved"], true);

    let (status, listed) = t.send("GET", &purchases, &manager, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(2));

    // supervisor read covers purchases the subordinate did not create
    let (status, listed) = t.send("GET", &purchases, &user, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(2));
    let (status, _) = t
        .send("GET", &format!("{purchases}/{}", id_of(&by_manager)?), &user, None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    // ...but not writes to them
    let (status, _) = t
        .send("PUT", &format!("{purchases}/{}", id_of(&by_manager)?), &user, Some(purchase("Desks", 3)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn approval_follows_the_latest_writer() -> Result<()> {
    let t = TestApp::new().await?;
    let (manager, company_id, department_id) = company_with_department(&t).await?;
    let purchases = format!("/api/v1/companies/{company_id}/departments/{department_id}/purchases");

    let user = t.user("ada", false).await?;
    let admin = t.login("root", "rootpassword").await?;
    t.send("PUT", "/api/v1/supervise/ada", &admin, Some(json!({ "supervisor": "grace" })))
        .await?;

    let (_, created) = t.send("POST", &purchases, &user, Some(purchase("Chairs", 4))).await?;
    let item = format!("{purchases}/{}", id_of(&created)?);

    let (status, updated) = t.send("PUT", &item, &manager, Some(purchase("Chairs", 5))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["approved"], true);

    let (status, updated) = t.send("PUT", &item, &user, Some(purchase("Chairs", 6))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["approved"], false);
    assert_eq!(updated["amount"], 6);

    let (status, _) = t.send("DELETE", &item, &user, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("GET", &item, &manager, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn missing_resources_are_404_before_permission_is_checked() -> Result<()> {
    let t = TestApp::new().await?;
    let (manager, company_id, department_id) = company_with_department(&t).await?;
    let stranger = t.user("mallory", false).await?;
    let missing = Uuid::new_v4();

    let (status, body) = t
        .send("GET", &format!("/api/v1/companies/{missing}/departments"), &stranger, None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = t
        .send(
            "GET",
            &format!("/api/v1/companies/{company_id}/departments/{department_id}/purchases/{missing}"),
            &manager,
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a department addressed through a company it does not belong to
    let (_, other) = t
        .send(
            "POST",
            "/api/v1/companies",
            &manager,
            Some(json!({ "name": "Globex", "establishedDate": "2021-06-01T00:00:00Z" })),
        )
        .await?;
    let (status, _) = t
        .send(
            "GET",
            &format!("/api/v1/companies/{}/departments/{department_id}", id_of(&other)?),
            &manager,
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send("GET", &format!("/api/v1/companies/{company_id}/departments"), &stranger, None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn companies_belong_to_their_manager() -> Result<()> {
    let t = TestApp::new().await?;
    let (manager, company_id, _) = company_with_department(&t).await?;
    let rival = t.user("linus", true).await?;
    let user = t.user("ada", false).await?;
    let admin = t.login("root", "rootpassword").await?;
    let company = format!("/api/v1/companies/{company_id}");

    let (status, _) = t
        .send(
            "POST",
            "/api/v1/companies",
            &user,
            Some(json!({ "name": "Initech", "establishedDate": "2022-01-01T00:00:00Z" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send("GET", &company, &rival, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .send(
            "POST",
            &format!("{company}/departments"),
            &rival,
            Some(json!({ "name": "Sabotage" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send("GET", "/api/v1/companies", &manager, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, listed) = t.send("GET", "/api/v1/companies", &admin, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, renamed) = t
        .send(
            "PUT",
            &company,
            &manager,
            Some(json!({ "name": "Acme Holdings", "establishedDate": "2020-01-01T00:00:00Z" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Acme Holdings");

    let (status, body) = t
        .send(
            "PUT",
            &company,
            &manager,
            Some(json!({ "name": "A", "establishedDate": "2020-01-01T00:00:00Z" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    let (status, _) = t.send("DELETE", &company, &manager, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("GET", &company, &admin, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn invalid_purchase_is_rejected() -> Result<()> {
    let t = TestApp::new().await?;
    let (manager, company_id, department_id) = company_with_department(&t).await?;
    let purchases = format!("/api/v1/companies/{company_id}/departments/{department_id}/purchases");

    let (status, body) = t.send("POST", &purchases, &manager, Some(purchase("Chairs", 0))).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    Ok(())
}
