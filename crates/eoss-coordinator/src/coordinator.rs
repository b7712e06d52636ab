//! The Object Coordinator (§4.4): the upload state machine, existence probe,
//! delete, and rollback. Owns every invariant between the metadata row, the
//! staging file, and the final file for a single `object_name`.
//!
//! Callers are expected to already hold the appropriate lock from
//! `eoss-lock` for the duration of a PUT/DELETE — the coordinator itself
//! doesn't take locks, it just assumes serialised access per `object_name`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use eoss_common::{EossError, Result};
use eoss_db::{MetadataDriver, State};
use tokio::io::AsyncWriteExt;
use tracing::{error, instrument, warn};

/// Outcome of [`ObjectCoordinator::check_exists`] (§4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Absent,
    Present,
    Init,
    Staged,
    Lost,
}

#[derive(Debug, Clone)]
pub struct ObjectCoordinator {
    db: MetadataDriver,
    storage_path: PathBuf,
}

impl ObjectCoordinator {
    pub fn new(db: MetadataDriver, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            storage_path: storage_path.into(),
        }
    }

    fn final_path(&self, object_name: &str) -> PathBuf {
        self.storage_path.join(object_name)
    }

    fn staging_path(&self, object_name: &str) -> PathBuf {
        self.storage_path.join(format!("{object_name}.temp"))
    }

    /// §4.4.1. Reads `state` for `id = object_name` and folds in filesystem
    /// presence for the `CLOSED` case to distinguish `Present` from `Lost`.
    #[instrument(level = "debug", skip(self))]
    pub async fn check_exists(&self, object_name: &str) -> Result<Existence> {
        let mut session = self.db.session().await?;
        let row = session.select_row(object_name).await?;
        session.close().await;

        let Some(row) = row else {
            return Ok(Existence::Absent);
        };

        match row.state {
            State::Init => Ok(Existence::Init),
            State::Staged => Ok(Existence::Staged),
            State::Closed => {
                if tokio::fs::try_exists(self.final_path(object_name))
                    .await
                    .map_err(EossError::Io)?
                {
                    Ok(Existence::Present)
                } else {
                    Ok(Existence::Lost)
                }
            }
        }
    }

    /// §4.4.2. Runs the PUT state machine to completion, or rolls back and
    /// returns [`EossError::RollbackOk`]/[`EossError::RollbackPartial`].
    ///
    /// Rejects up front (no row touched) if the object is already `Init`,
    /// `Staged`, or `Lost`.
    #[instrument(level = "debug", skip(self, bytes))]
    pub async fn put(
        &self,
        object_name: &str,
        filename: &str,
        version: Option<&str>,
        bytes: &[u8],
    ) -> Result<()> {
        match self.check_exists(object_name).await? {
            Existence::Init => return Err(EossError::StateInit),
            Existence::Staged => return Err(EossError::StateStaged),
            Existence::Lost => return Err(EossError::Lost),
            Existence::Absent | Existence::Present => {}
        }

        // Step (A). A failure here leaves nothing to undo: the insert/update
        // either never committed or never ran.
        self.step_a(object_name, filename, version).await?;

        // Steps (B)-(E). Any failure past this point rolls back and the
        // rollback outcome — not the triggering cause — becomes the response.
        if let Err(cause) = self.write_and_close(object_name, bytes).await {
            warn!(target: "object_client", object_name, error = %cause, "put failed after step (A), rolling back");
            return Err(self.rollback(object_name).await);
        }

        Ok(())
    }

    async fn step_a(&self, object_name: &str, filename: &str, version: Option<&str>) -> Result<()> {
        let mut session = self.db.session().await?;
        session.upsert_init(object_name, filename, version).await?;
        session.commit().await
    }

    async fn write_and_close(&self, object_name: &str, bytes: &[u8]) -> Result<()> {
        // Step (B): write the staging file and fsync before telling the
        // catalog it's staged.
        let staging = self.staging_path(object_name);
        let mut file = tokio::fs::File::create(&staging).await.map_err(EossError::Io)?;
        file.write_all(bytes).await.map_err(EossError::Io)?;
        file.sync_all().await.map_err(EossError::Io)?;
        drop(file);

        // Step (C).
        {
            let mut session = self.db.session().await?;
            session.mark_staged(object_name).await?;
            session.commit().await?;
        }

        // Step (D): same-filesystem rename, atomic under POSIX semantics.
        let final_path = self.final_path(object_name);
        tokio::fs::rename(&staging, &final_path).await.map_err(EossError::Io)?;

        // Step (E).
        let size = bytes.len() as i64;
        let timestamp = unix_now();
        let mut session = self.db.session().await?;
        session.mark_closed(object_name, size, timestamp).await?;
        session.commit().await?;

        Ok(())
    }

    /// §4.4.3. Never propagates the original failure — only whether every
    /// sub-step succeeded.
    async fn rollback(&self, object_name: &str) -> EossError {
        let mut all_ok = true;

        if let Err(e) = remove_if_present(&self.final_path(object_name)).await {
            error!(target: "object_client", object_name, error = %e, "rollback: failed to unlink final file");
            all_ok = false;
        }
        if let Err(e) = remove_if_present(&self.staging_path(object_name)).await {
            error!(target: "object_client", object_name, error = %e, "rollback: failed to unlink staging file");
            all_ok = false;
        }

        match self.db.session().await {
            Ok(mut session) => {
                let deleted = session.delete_row(object_name).await;
                if deleted.is_err() {
                    all_ok = false;
                }
                if session.commit().await.is_err() {
                    all_ok = false;
                }
            }
            Err(_) => all_ok = false,
        }

        if all_ok {
            EossError::RollbackOk
        } else {
            EossError::RollbackPartial
        }
    }

    /// §4.4.4. Caller must have already confirmed `Existence::Present`.
    /// No automatic rollback: a failure here surfaces as-is.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, object_name: &str) -> Result<()> {
        tokio::fs::remove_file(self.final_path(object_name))
            .await
            .map_err(EossError::Io)?;

        let mut session = self.db.session().await?;
        session.delete_row(object_name).await?;
        session.commit().await
    }

    pub fn db(&self) -> &MetadataDriver {
        &self.db
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoss_common::Config;
    use eoss_db::ensure_schema;
    use tempfile::tempdir;

    async fn coordinator_in(storage: &Path) -> ObjectCoordinator {
        let db_path = storage.join("mds.sql");
        let config = Config {
            metadata_db_path: db_path,
            ..Config::default()
        };
        let db = MetadataDriver::open(&config).await.unwrap();
        ensure_schema(db.pool(), db.table()).await.unwrap();
        ObjectCoordinator::new(db, storage.to_path_buf())
    }

    #[tokio::test]
    async fn put_then_check_exists_is_present() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        coordinator
            .put("obj-1", "hello.txt", None, b"hi")
            .await
            .unwrap();

        assert_eq!(
            coordinator.check_exists("obj-1").await.unwrap(),
            Existence::Present
        );
        let bytes = tokio::fs::read(dir.path().join("obj-1")).await.unwrap();
        assert_eq!(bytes, b"hi");
        assert!(!dir.path().join("obj-1.temp").exists());
    }

    #[tokio::test]
    async fn reupload_overwrites_an_existing_present_object() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        coordinator.put("obj-1", "hello.txt", None, b"hi").await.unwrap();
        coordinator
            .put("obj-1", "hello.txt", None, b"updated bytes")
            .await
            .unwrap();

        let bytes = tokio::fs::read(dir.path().join("obj-1")).await.unwrap();
        assert_eq!(bytes, b"updated bytes");
    }

    #[tokio::test]
    async fn put_rejects_when_object_is_init_or_staged() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        {
            let mut session = coordinator.db().session().await.unwrap();
            session.upsert_init("obj-1", "hello.txt", None).await.unwrap();
            session.commit().await.unwrap();
        }

        let err = coordinator.put("obj-1", "hello.txt", None, b"hi").await.unwrap_err();
        assert!(matches!(err, EossError::StateInit));
    }

    #[tokio::test]
    async fn put_rejects_when_object_is_lost() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        {
            let mut session = coordinator.db().session().await.unwrap();
            session.upsert_init("obj-1", "hello.txt", None).await.unwrap();
            session.mark_staged("obj-1").await.unwrap();
            session.mark_closed("obj-1", 5, 1).await.unwrap();
            session.commit().await.unwrap();
        }

        let err = coordinator.put("obj-1", "hello.txt", None, b"hi").await.unwrap_err();
        assert!(matches!(err, EossError::Lost));
    }

    #[tokio::test]
    async fn delete_removes_file_and_row() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        coordinator.put("obj-1", "hello.txt", None, b"hi").await.unwrap();
        coordinator.delete("obj-1").await.unwrap();

        assert_eq!(coordinator.check_exists("obj-1").await.unwrap(), Existence::Absent);
        assert!(!dir.path().join("obj-1").exists());
    }

    #[tokio::test]
    async fn check_exists_absent_for_unknown_object() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        assert_eq!(
            coordinator.check_exists("nope").await.unwrap(),
            Existence::Absent
        );
    }

    #[tokio::test]
    async fn rollback_after_mid_write_failure_leaves_object_absent() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator_in(dir.path()).await;

        // Force step (D)'s rename to fail by making the storage directory
        // read-only after the staging write would otherwise succeed: instead,
        // simulate the same effect by pre-creating a directory at the final
        // path so the rename fails with a clear, deterministic I/O error.
        tokio::fs::create_dir(dir.path().join("obj-1")).await.unwrap();

        let result = coordinator.put("obj-1", "hello.txt", None, b"hi").await;
        assert!(matches!(
            result,
            Err(EossError::RollbackOk) | Err(EossError::RollbackPartial)
        ));

        // The row must be gone; a directory collision at the final path is
        // left alone since unlinking a directory is out of scope for the
        // final-file rollback step.
        let mut session = coordinator.db().session().await.unwrap();
        assert!(session.select_row("obj-1").await.unwrap().is_none());
    }
}
