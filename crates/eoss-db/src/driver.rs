//! The Metadata Driver: a thin session-oriented wrapper over a local
//! transactional SQLite database (§4.2).
//!
//! Each request opens its own [`Session`] (a single transaction); sessions
//! are never shared across concurrent requests. A `Session` that is dropped
//! without `commit()` rolls back, matching `close()` releasing resources
//! unconditionally.

use eoss_common::{Config, EossError, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, Transaction};
use tracing::{debug, instrument};

use crate::models::{Row, State};

#[derive(Debug, Clone)]
pub struct MetadataDriver {
    pool: SqlitePool,
    table: String,
}

impl MetadataDriver {
    /// Establish a session pool. Fails with [`EossError::Connect`] on a bad
    /// DSN or unreachable file.
    #[instrument(level = "debug", skip(config))]
    pub async fn open(config: &Config) -> Result<Self> {
        let dsn = format!(
            "sqlite://{}?mode=rwc",
            config.metadata_db_path.display()
        );
        debug!(target: "mds_client", dsn, "opening metadata store");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&dsn)
            .await
            .map_err(|e| EossError::Connect(e.to_string()))?;

        Ok(Self {
            pool,
            table: config.metadata_db_table.clone(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a fresh session (a single SQLite transaction) for one request.
    pub async fn session(&self) -> Result<Session<'_>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EossError::Connect(e.to_string()))?;
        Ok(Session {
            tx,
            table: self.table.clone(),
        })
    }
}

pub struct Session<'c> {
    tx: Transaction<'c, sqlx::Sqlite>,
    table: String,
}

fn row_from_sqlite(row: SqliteRow) -> Result<Row> {
    let state_code: i64 = row
        .try_get("state")
        .map_err(|e| EossError::Exec(e.to_string()))?;
    Ok(Row {
        id: row.try_get("id").map_err(|e| EossError::Exec(e.to_string()))?,
        filename: row
            .try_get("filename")
            .map_err(|e| EossError::Exec(e.to_string()))?,
        version: row
            .try_get("version")
            .map_err(|e| EossError::Exec(e.to_string()))?,
        size: row.try_get("size").map_err(|e| EossError::Exec(e.to_string()))?,
        timestamp: row
            .try_get("timestamp")
            .map_err(|e| EossError::Exec(e.to_string()))?,
        state: State::try_from(state_code)?,
    })
}

impl<'c> Session<'c> {
    /// Step (A): insert a fresh row in `INIT`, or — if the id already has a
    /// row (a re-upload) — reset it to `INIT` in place.
    pub async fn upsert_init(&mut self, id: &str, filename: &str, version: Option<&str>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {tbl} (id, filename, version, size, timestamp, state) \
             VALUES (?, ?, ?, NULL, NULL, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                filename = excluded.filename, \
                version = excluded.version, \
                size = NULL, \
                timestamp = NULL, \
                state = excluded.state",
            tbl = self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(filename)
            .bind(version)
            .bind(State::Init.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;
        Ok(())
    }

    /// Step (C): staging file is flushed and synced; advance to `STAGED`.
    pub async fn mark_staged(&mut self, id: &str) -> Result<()> {
        let sql = format!("UPDATE {tbl} SET state = ? WHERE id = ?", tbl = self.table);
        sqlx::query(&sql)
            .bind(State::Staged.as_i64())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;
        Ok(())
    }

    /// Step (E): rename succeeded; record size/timestamp and advance to `CLOSED`.
    pub async fn mark_closed(&mut self, id: &str, size: i64, timestamp: i64) -> Result<()> {
        let sql = format!(
            "UPDATE {tbl} SET size = ?, timestamp = ?, state = ? WHERE id = ?",
            tbl = self.table
        );
        sqlx::query(&sql)
            .bind(size)
            .bind(timestamp)
            .bind(State::Closed.as_i64())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;
        Ok(())
    }

    pub async fn select_row(&mut self, id: &str) -> Result<Option<Row>> {
        let sql = format!("SELECT * FROM {tbl} WHERE id = ?", tbl = self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;
        row.map(row_from_sqlite).transpose()
    }

    pub async fn delete_row(&mut self, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {tbl} WHERE id = ?", tbl = self.table);
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;
        Ok(())
    }

    /// Every row whose state is not `CLOSED` — the Sweeper's selection (§4.5).
    pub async fn select_non_closed(&mut self) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT * FROM {tbl} WHERE state != ?",
            tbl = self.table
        );
        let rows = sqlx::query(&sql)
            .bind(State::Closed.as_i64())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;
        rows.into_iter().map(row_from_sqlite).collect()
    }

    /// Row counts and timestamp extremes backing `GET /eoss/v1/stats`.
    pub async fn stats(&mut self) -> Result<StatsRow> {
        let sql = format!(
            "SELECT \
                COUNT(*) AS total, \
                COALESCE(SUM(size), 0) AS total_bytes, \
                MAX(timestamp) AS youngest, \
                MIN(timestamp) AS oldest, \
                SUM(CASE WHEN state = 0 THEN 1 ELSE 0 END) AS closed, \
                SUM(CASE WHEN state = 1 THEN 1 ELSE 0 END) AS init, \
                SUM(CASE WHEN state = 2 THEN 1 ELSE 0 END) AS staged \
             FROM {tbl}",
            tbl = self.table
        );
        let row = sqlx::query(&sql)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| EossError::Exec(e.to_string()))?;

        Ok(StatsRow {
            total: row.try_get::<i64, _>("total").map_err(|e| EossError::Exec(e.to_string()))?,
            total_bytes: row
                .try_get::<i64, _>("total_bytes")
                .map_err(|e| EossError::Exec(e.to_string()))?,
            youngest: row
                .try_get::<Option<i64>, _>("youngest")
                .map_err(|e| EossError::Exec(e.to_string()))?,
            oldest: row
                .try_get::<Option<i64>, _>("oldest")
                .map_err(|e| EossError::Exec(e.to_string()))?,
            closed: row.try_get::<i64, _>("closed").map_err(|e| EossError::Exec(e.to_string()))?,
            init: row.try_get::<i64, _>("init").map_err(|e| EossError::Exec(e.to_string()))?,
            staged: row.try_get::<i64, _>("staged").map_err(|e| EossError::Exec(e.to_string()))?,
        })
    }

    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| EossError::Commit(e.to_string()))
    }

    /// Release the session without committing pending mutations.
    pub async fn close(self) {
        let _ = self.tx.rollback().await;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatsRow {
    pub total: i64,
    pub total_bytes: i64,
    pub youngest: Option<i64>,
    pub oldest: Option<i64>,
    pub closed: i64,
    pub init: i64,
    pub staged: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::ensure_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn driver_with_schema() -> MetadataDriver {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ensure_schema(&pool, "metadata").await.unwrap();
        MetadataDriver {
            pool,
            table: "metadata".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_insert_then_reupload_resets_to_init() {
        let driver = driver_with_schema().await;

        let mut s = driver.session().await.unwrap();
        s.upsert_init("abc", "hello.txt", None).await.unwrap();
        s.mark_staged("abc").await.unwrap();
        s.mark_closed("abc", 2, 1000).await.unwrap();
        s.commit().await.unwrap();

        let mut s = driver.session().await.unwrap();
        let row = s.select_row("abc").await.unwrap().unwrap();
        assert_eq!(row.state.as_i64(), State::Closed.as_i64());
        assert_eq!(row.size, Some(2));

        s.upsert_init("abc", "hello.txt", None).await.unwrap();
        let row = s.select_row("abc").await.unwrap().unwrap();
        assert_eq!(row.state.as_i64(), State::Init.as_i64());
        assert_eq!(row.size, None);
        assert_eq!(row.timestamp, None);
        s.commit().await.unwrap();
    }

    #[tokio::test]
    async fn close_without_commit_rolls_back() {
        let driver = driver_with_schema().await;

        let mut s = driver.session().await.unwrap();
        s.upsert_init("xyz", "f.txt", None).await.unwrap();
        s.close().await;

        let mut s = driver.session().await.unwrap();
        assert!(s.select_row("xyz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn select_non_closed_only_returns_in_flight_rows() {
        let driver = driver_with_schema().await;

        let mut s = driver.session().await.unwrap();
        s.upsert_init("a", "a.txt", None).await.unwrap();
        s.upsert_init("b", "b.txt", None).await.unwrap();
        s.mark_staged("b").await.unwrap();
        s.mark_closed("b", 1, 1).await.unwrap();
        s.commit().await.unwrap();

        let mut s = driver.session().await.unwrap();
        let rows = s.select_non_closed().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }

    #[tokio::test]
    async fn stats_reflect_state_counts_and_total_bytes() {
        let driver = driver_with_schema().await;

        let mut s = driver.session().await.unwrap();
        s.upsert_init("a", "a.txt", None).await.unwrap();
        s.mark_staged("a").await.unwrap();
        s.mark_closed("a", 10, 111).await.unwrap();
        s.upsert_init("b", "b.txt", None).await.unwrap();
        s.commit().await.unwrap();

        let mut s = driver.session().await.unwrap();
        let stats = s.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_bytes, 10);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.init, 1);
        assert_eq!(stats.staged, 0);
        assert_eq!(stats.youngest, Some(111));
        assert_eq!(stats.oldest, Some(111));
    }
}
