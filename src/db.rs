use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool using the application configuration
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!("Database connection established");
    Ok(pool)
}

/// Runs all pending migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    crate::migrator::Migrator::up(pool, None).await?;
    info!("Database migrations applied");
    Ok(())
}
