//! Bootstrap schema creation.
//!
//! Out of scope for the running service (§1): a deployment is expected to
//! provision the table once via its own bootstrap step. This module exists so
//! that step — and test fixtures that stand in for it — have one place to get
//! the DDL from, instead of each caller hand-rolling the `CREATE TABLE`.

use eoss_common::{EossError, Result};
use sqlx::SqlitePool;
use tracing::info;

/// `CREATE TABLE <tbl> (id STRING, filename STRING, version STRING, size
/// INTEGER, timestamp INTEGER, state INTEGER)` per §4.2. `table` comes from
/// `METADATA_DB_TABLE` in the operator's own configuration, never from a
/// request, so interpolating it into DDL carries no injection surface.
pub async fn ensure_schema(pool: &SqlitePool, table: &str) -> Result<()> {
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            id TEXT PRIMARY KEY, \
            filename TEXT NOT NULL, \
            version TEXT, \
            size INTEGER, \
            timestamp INTEGER, \
            state INTEGER NOT NULL\
        )"
    );

    sqlx::query(&ddl)
        .execute(pool)
        .await
        .map_err(|e| EossError::Exec(e.to_string()))?;

    info!(target: "mds_client", table, "metadata schema ensured");
    Ok(())
}
