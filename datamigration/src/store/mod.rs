//! Status store: persistence of per-run progress.
//!
//! - [`InMemoryStatusStore`] for tests and single-process runs
//! - [`FileStatusStore`] for durable, resumable runs

mod base;
mod file;
mod memory;

pub use base::StatusStore;
pub use file::FileStatusStore;
pub use memory::InMemoryStatusStore;

#[cfg(test)]
pub use base::MockStatusStore;

use crate::config::StatusStoreConfig;
use crate::errors::StoreError;
use std::sync::Arc;

/// Builds the backend selected by `config`.
///
/// # Errors
///
/// Returns an error if a file backend cannot create its directory.
pub async fn build_status_store(
    config: &StatusStoreConfig,
) -> Result<Arc<dyn StatusStore>, StoreError> {
    match config {
        StatusStoreConfig::Memory => Ok(Arc::new(InMemoryStatusStore::new())),
        StatusStoreConfig::File { directory } => {
            Ok(Arc::new(FileStatusStore::open(directory.clone()).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_memory_store() {
        let store = build_status_store(&StatusStoreConfig::Memory).await.unwrap();
        assert_eq!(store.backend_type(), "memory");
    }

    #[tokio::test]
    async fn test_build_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StatusStoreConfig::File {
            directory: dir.path().join("runs"),
        };

        let store = build_status_store(&config).await.unwrap();
        assert_eq!(store.backend_type(), "file");
        assert!(dir.path().join("runs").is_dir());
    }
}
