//! Connection pool setup: `diesel` + `r2d2` + `diesel_migrations`, rooted
//! at a plain base directory since this crate ships no GUI shell to hand
//! it an app data path.

use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;
use thiserror::Error;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database initialization error: {0}")]
    Init(String),
    #[error("database migration error: {0}")]
    Migration(String),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),
    #[error("diesel error: {0}")]
    Diesel(#[from] diesel::result::Error),
}

/// Opens (creating if absent) the SQLite database at `db_path` and runs any
/// pending migrations.
pub fn init(db_path: &Path) -> Result<DbPool, DbError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DbError::Init(format!("failed to create data directory: {e}")))?;
    }
    let db_url = db_path.to_string_lossy().to_string();

    tracing::info!(db_url = %db_url, "initializing task store database");

    let manager = ConnectionManager::<SqliteConnection>::new(&db_url);
    let pool = r2d2::Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| DbError::Init(format!("failed to create connection pool: {e}")))?;

    let mut conn = pool
        .get()
        .map_err(|e| DbError::Init(format!("failed to get database connection: {e}")))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DbError::Migration(e.to_string()))?;

    tracing::info!("task store database ready");
    Ok(pool)
}
