use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use budget_builder::auth::seed::{seed_admin, AdminSeed, SeedOutcome};
use budget_builder::auth::PasswordCredentials;
use budget_builder::store::SqliteStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "budget-builder maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create the admin account (all roles) unless it already exists
    SeedAdmin {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Falls back to ADMIN_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            budget_builder::db::migrate(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            print_status(&pool).await?;
        }
        Commands::SeedAdmin {
            username,
            email,
            password,
        } => {
            let mut seed = match (AdminSeed::from_env(), password) {
                (Some(mut seed), Some(password)) => {
                    seed.password = password;
                    seed
                }
                (Some(seed), None) => seed,
                (None, Some(password)) => AdminSeed {
                    user_name: "admin".to_string(),
                    email: "admin@localhost".to_string(),
                    password,
                },
                (None, None) => anyhow::bail!("no admin password: pass --password or set ADMIN_PASSWORD"),
            };
            if let Some(username) = username {
                seed.user_name = username;
            }
            if let Some(email) = email {
                seed.email = email;
            }

            let pool = get_pool().await?;
            budget_builder::db::migrate(&pool).await?;
            let store = Arc::new(SqliteStore::new(pool));
            let credentials = PasswordCredentials::new(store.clone());

            match seed_admin(store.as_ref(), &credentials, &seed)
                .await
                .context("failed to seed admin")?
            {
                SeedOutcome::Created(id) => println!("Created admin {} ({})", seed.user_name, id),
                SeedOutcome::AlreadyPresent(id) => println!("Admin {} already present ({})", seed.user_name, id),
            }
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    let migrator = sqlx::migrate!();

    // If the migrations table doesn't exist, nothing is applied yet
    let has_table: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied_versions: HashSet<i64> = if has_table > 0 {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.trim();
        println!("{:<8} {:<20} {}", status, migration.version, if desc.is_empty() { "unknown" } else { desc });
    }

    Ok(())
}
