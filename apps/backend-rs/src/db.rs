use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;

/// Builds a lazily connecting pool so startup never blocks on the database.
pub fn create_pool(config: &AppConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(database_url) = config.database_url.as_deref() else {
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_max_connections.max(1))
        .min_connections(config.db_pool_min_connections)
        .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
        .connect_lazy(database_url)?;
    Ok(Some(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
