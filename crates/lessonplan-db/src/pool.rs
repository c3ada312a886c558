//! Connection pools, embedded migrations and database bootstrap.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/lessonplan-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// What [`ensure_database_exists`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Created,
    AlreadyExisted,
}

/// Row counts for every table the migrations create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct TableCounts {
    pub lesson_plans: i64,
    pub context_entries: i64,
    pub curriculum_standards: i64,
    pub curriculum_mappings: i64,
    pub generation_attempts: i64,
}

impl TableCounts {
    pub fn rows(&self) -> [(&'static str, i64); 5] {
        [
            ("lesson_plans", self.lesson_plans),
            ("context_entries", self.context_entries),
            ("curriculum_standards", self.curriculum_standards),
            ("curriculum_mappings", self.curriculum_mappings),
            ("generation_attempts", self.generation_attempts),
        ]
    }
}

async fn connect(config: &DbConfig, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Pool sized by [`DbConfig::max_connections`].
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(config, config.max_connections).await
}

/// Single-connection pool on the server's `postgres` database.
pub async fn maintenance_pool(config: &DbConfig) -> Result<PgPool> {
    connect(&config.maintenance(), 1).await
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!(migrations = MIGRATOR.iter().count(), "migrations applied");
    Ok(())
}

/// Create the database named by `config` unless it already exists.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<Bootstrap> {
    let name = config.validated_database_name()?;
    let maintenance = maintenance_pool(config).await?;
    let outcome = create_if_missing(&maintenance, name).await;
    maintenance.close().await;

    let outcome = outcome?;
    info!(db = name, ?outcome, "database bootstrap");
    Ok(outcome)
}

async fn create_if_missing(maintenance: &PgPool, name: &str) -> Result<Bootstrap> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(maintenance)
            .await
            .context("failed to query pg_database")?;
    if exists {
        return Ok(Bootstrap::AlreadyExisted);
    }

    maintenance
        .execute(format!("CREATE DATABASE {name}").as_str())
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    Ok(Bootstrap::Created)
}

/// Bootstrap the database, open a pool on it and apply migrations.
pub async fn open_migrated(config: &DbConfig) -> Result<PgPool> {
    ensure_database_exists(config).await?;
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Count rows in every managed table with one round trip.
pub async fn table_counts(pool: &PgPool) -> Result<TableCounts> {
    sqlx::query_as::<_, TableCounts>(
        "SELECT \
             (SELECT COUNT(*) FROM lesson_plans) AS lesson_plans, \
             (SELECT COUNT(*) FROM context_entries) AS context_entries, \
             (SELECT COUNT(*) FROM curriculum_standards) AS curriculum_standards, \
             (SELECT COUNT(*) FROM curriculum_mappings) AS curriculum_mappings, \
             (SELECT COUNT(*) FROM generation_attempts) AS generation_attempts",
    )
    .fetch_one(pool)
    .await
    .context("failed to count table rows")
}
