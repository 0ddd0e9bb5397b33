//! Database connection, migrations, and corrupt-file recovery.

use std::path::{Path, PathBuf};

use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use punchbridge_core::db::{open_pool, open_pool_in_memory, StoreError};
use punchbridge_core::time::epoch_millis;

/// Handle to the agent's store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open or create the store at the given path.
    ///
    /// When the existing file cannot be opened or migrated, it is renamed to
    /// `<path>.backup.<epoch_ms>` (together with its `-wal`/`-shm` siblings)
    /// and a fresh store is initialised in its place.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        match Self::try_open(path).await {
            Ok(db) => Ok(db),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Store unreadable; backing it up and reinitialising"
                );
                backup_corrupt_store(path)?;
                Self::try_open(path).await
            }
        }
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = open_pool_in_memory().await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn try_open(path: &Path) -> Result<Self, StoreError> {
        let pool = open_pool(path).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        info!("Store migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Move an unreadable store file (and SQLite sidecars) out of the way.
fn backup_corrupt_store(path: &Path) -> Result<(), StoreError> {
    let backup = PathBuf::from(format!("{}.backup.{}", path.display(), epoch_millis()));
    if path.exists() {
        std::fs::rename(path, &backup).map_err(|e| StoreError::Io(e.to_string()))?;
        info!(backup = %backup.display(), "Corrupt store moved aside");
    }
    for suffix in ["-wal", "-shm"] {
        let sidecar = PathBuf::from(format!("{}{}", path.display(), suffix));
        if sidecar.exists() {
            let target = PathBuf::from(format!("{}{}", backup.display(), suffix));
            std::fs::rename(&sidecar, &target).map_err(|e| StoreError::Io(e.to_string()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_works() {
        let db = Database::open_in_memory().await;
        assert!(db.is_ok());
    }

    #[tokio::test]
    async fn corrupt_file_is_backed_up_and_reinitialised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.db");
        std::fs::write(&path, b"this is not a sqlite database").unwrap();

        let db = Database::open(&path).await.unwrap();
        // Fresh store answers queries.
        let devices = db.list_devices(false).await.unwrap();
        assert!(devices.is_empty());

        // The garbage file was moved aside, not deleted.
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".backup."))
            .collect();
        assert_eq!(backups.len(), 1);
    }
}
