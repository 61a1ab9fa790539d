use std::sync::Arc;

use anyhow::Context;
use budget_builder::auth::seed::{seed_admin, AdminSeed};
use budget_builder::auth::PasswordCredentials;
use budget_builder::store::SqliteStore;
use budget_builder::{app, db, docs};

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;

    match AdminSeed::from_env() {
        Some(seed) => {
            let store = Arc::new(SqliteStore::new(pool.clone()));
            let credentials = PasswordCredentials::new(store.clone());
            seed_admin(store.as_ref(), &credentials, &seed)
                .await
                .context("failed to seed admin account")?;
        }
        None => tracing::warn!("ADMIN_PASSWORD not set; skipping admin seeding"),
    }

    let app = app::create_app(pool).await?;

    let port = match std::env::var("APP_PORT") {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("APP_PORT must be a valid port, got {value:?}"))?,
        Err(_) => DEFAULT_PORT,
    };

    let app = app.merge(docs::swagger_routes(docs::build_openapi(port)));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
