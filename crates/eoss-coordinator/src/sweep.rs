//! Crash-Recovery Sweeper (§4.5): run once before the HTTP listener accepts
//! connections. Reconciles any row left mid-upload by a previous crash.

use eoss_db::MetadataDriver;
use eoss_common::Result;
use std::path::Path;
use tracing::{info, instrument};

/// Deletes every row whose state is not `CLOSED`, along with any final/
/// staging file remnants for that id. Missing files are not errors — the
/// crash may have happened before either was ever written.
#[instrument(level = "info", skip(db))]
pub async fn run_sweep(db: &MetadataDriver, storage_path: &Path) -> Result<()> {
    let mut session = db.session().await?;
    let rows = session.select_non_closed().await?;

    if rows.is_empty() {
        session.close().await;
        info!(target: "object_client", "crash-recovery sweep found nothing to reconcile");
        return Ok(());
    }

    for row in &rows {
        remove_if_present(&storage_path.join(&row.id)).await;
        remove_if_present(&storage_path.join(format!("{}.temp", row.id))).await;
        session.delete_row(&row.id).await?;
    }
    session.commit().await?;

    info!(target: "object_client", swept = rows.len(), "crash-recovery sweep reconciled partial uploads");
    Ok(())
}

async fn remove_if_present(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoss_common::Config;
    use eoss_db::ensure_schema;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sweep_removes_non_closed_rows_and_their_files() {
        let dir = tempdir().unwrap();
        let config = Config {
            metadata_db_path: dir.path().join("mds.sql"),
            ..Config::default()
        };
        let db = MetadataDriver::open(&config).await.unwrap();
        ensure_schema(db.pool(), db.table()).await.unwrap();

        {
            let mut session = db.session().await.unwrap();
            session.upsert_init("init-row", "a.txt", None).await.unwrap();
            session.upsert_init("staged-row", "b.txt", None).await.unwrap();
            session.mark_staged("staged-row").await.unwrap();
            session.upsert_init("closed-row", "c.txt", None).await.unwrap();
            session.mark_staged("closed-row").await.unwrap();
            session.mark_closed("closed-row", 3, 1).await.unwrap();
            session.commit().await.unwrap();
        }
        tokio::fs::write(dir.path().join("staged-row.temp"), b"abc").await.unwrap();
        tokio::fs::write(dir.path().join("closed-row"), b"abc").await.unwrap();

        run_sweep(&db, dir.path()).await.unwrap();

        let mut session = db.session().await.unwrap();
        assert!(session.select_row("init-row").await.unwrap().is_none());
        assert!(session.select_row("staged-row").await.unwrap().is_none());
        assert!(session.select_row("closed-row").await.unwrap().is_some());

        assert!(!dir.path().join("staged-row.temp").exists());
        assert!(dir.path().join("closed-row").exists());
    }

    #[tokio::test]
    async fn sweep_on_an_empty_catalog_is_a_no_op() {
        let dir = tempdir().unwrap();
        let config = Config {
            metadata_db_path: dir.path().join("mds.sql"),
            ..Config::default()
        };
        let db = MetadataDriver::open(&config).await.unwrap();
        ensure_schema(db.pool(), db.table()).await.unwrap();

        run_sweep(&db, dir.path()).await.unwrap();
    }
}
