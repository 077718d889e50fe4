//! Bruma CLI - migrations and management tools.
//!
//! # Commands
//!
//! - `migrate` - Run pending storefront database migrations
//! - `seed-admin` - Create (or promote) an admin user
//!
//! Connection configuration comes from `STOREFRONT_DATABASE_URL`, with a
//! fallback to `DATABASE_URL`, matching the storefront binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sqlx::migrate::Migrator;

use bruma_core::Email;
use bruma_storefront::db::{self, users::UserRepository};
use bruma_storefront::services::auth::hash_password;

/// Storefront schema migrations, embedded at compile time.
static MIGRATOR: Migrator = sqlx::migrate!("../storefront/migrations");

/// Bruma management CLI.
#[derive(Debug, Parser)]
#[command(name = "bruma-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate,
    /// Create an admin user, or promote an existing user to admin.
    SeedAdmin {
        /// Email address of the admin account.
        #[arg(long)]
        email: String,
        /// Password for the admin account.
        #[arg(long)]
        password: String,
        /// Optional display name.
        #[arg(long)]
        name: Option<String>,
    },
}

/// CLI-level errors.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing STOREFRONT_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] bruma_core::EmailError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("auth error: {0}")]
    Auth(#[from] bruma_storefront::services::auth::AuthError),

    #[error("repository error: {0}")]
    Repository(#[from] bruma_storefront::db::RepositoryError),
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bruma_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;

    match command {
        Command::Migrate => {
            MIGRATOR.run(&pool).await?;
            tracing::info!("migrations applied");
        }
        Command::SeedAdmin {
            email,
            password,
            name,
        } => {
            let email = Email::parse(&email)?;
            let password_hash = hash_password(&password)?;

            let user = UserRepository::new(&pool)
                .upsert_admin(&email, name.as_deref(), &password_hash)
                .await?;

            tracing::info!(email = %user.email, id = %user.id, "admin user ready");
        }
    }

    Ok(())
}

/// Resolve the database URL the same way the storefront does.
fn database_url() -> Result<SecretString, CliError> {
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingDatabaseUrl)
}
