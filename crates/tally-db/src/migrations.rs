//! Schema migrations, embedded at compile time from `migrations/sqlite/`.
//!
//! Files are applied in version order and recorded in `_sqlx_migrations`.
//! An applied file must never change: its checksum is verified on every
//! start. Schema changes go in a new `NNN_description.sql`.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded. Safe to call on each start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let pending = pending_migrations(pool).await?;
    if pending.is_empty() {
        info!("Schema up to date");
        return Ok(());
    }

    info!(?pending, "Applying migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Versions that are embedded in the binary but not applied to `pool`.
pub async fn pending_migrations(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let applied: Vec<i64> = match sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
        .fetch_all(pool)
        .await
    {
        Ok(versions) => versions,
        // Fresh database; the bookkeeping table is created by the first run.
        Err(sqlx::Error::Database(e)) if e.message().contains("no such table") => Vec::new(),
        Err(e) => {
            warn!(error = %e, "Could not read applied migrations");
            return Err(e.into());
        }
    };

    Ok(MIGRATOR
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect())
}
