//! Database pool setup.
//!
//! SYSTEM CONTEXT
//! ==============
//! Schema migrations are embedded at compile time and run to completion
//! before the listener binds; the rest of the server assumes the `users`
//! and `messages` tables exist.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

static MIGRATOR: Migrator = sqlx::migrate!("src/db/migrations");

/// Initialize the connection pool and run pending migrations.
///
/// Pool size comes from `DB_MAX_CONNECTIONS` (default 5).
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}
