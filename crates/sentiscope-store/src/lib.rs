//! Storage layer: PostgreSQL pool, embedded migrations, and the `Store` seam
//! used by the HTTP layer.

mod error;
mod models;
mod repo;

pub use error::StoreError;
pub use models::{SentimentAnalysis, User};
pub use repo::{PgStore, Store};

pub use sqlx::PgPool;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::info;

/// Default pool size when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection options assembled from discrete settings.
///
/// Used when no `DATABASE_URL` is given. The password is always supplied by
/// the caller; there is no built-in default.
pub fn connect_options(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    database: &str,
) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .password(password)
        .database(database)
}

/// Creates a connection pool from a `postgres://` URL.
///
/// # Errors
///
/// Returns an error if the URL is malformed or the database is unreachable.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let options: PgConnectOptions = database_url.parse()?;
    create_pool_with(options, max_connections).await
}

/// Creates a connection pool from explicit options.
///
/// # Errors
///
/// Returns an error if the connection to the database fails.
pub async fn create_pool_with(
    options: PgConnectOptions,
    max_connections: u32,
) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    info!(max_connections, "database pool ready");
    Ok(pool)
}

/// Runs all pending migrations.
///
/// # Errors
///
/// Returns an error if running migrations fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
