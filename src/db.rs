// src/db.rs

use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::time::Duration;
use tokio_postgres::{Config, NoTls};

use crate::config::PostgresSettings;

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Constructs a PostgreSQL config from the resolved settings.
fn build_pg_config(settings: &PostgresSettings) -> Config {
    let mut config = Config::new();

    info!(
        "DB Config: Host={}, Port={}, DB={}, User={}",
        settings.host, settings.port, settings.dbname, settings.user
    );
    config
        .host(&settings.host)
        .port(settings.port)
        .dbname(&settings.dbname)
        .user(&settings.user)
        .password(&settings.password);
    config.application_name("facility_coordinate_validation");
    config.connect_timeout(Duration::from_secs(10));
    config
}

/// Initializes the database connection pool.
///
/// The reconciler works one facility at a time, so the pool stays small.
pub async fn connect(settings: &PostgresSettings) -> Result<PgPool> {
    let config = build_pg_config(settings);
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    let pool = Pool::builder()
        .max_size(4)
        .min_idle(Some(1))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    drop(conn);
    info!("Database connection pool initialized successfully.");
    Ok(pool)
}
