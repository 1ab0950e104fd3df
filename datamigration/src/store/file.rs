use super::StatusStore;
use crate::core::AggregateStatus;
use crate::errors::StoreError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const DOCUMENT_EXTENSION: &str = "json";
const HISTORY_SUFFIX: &str = ".history.jsonl";

/// Status store keeping one JSON document per run in a directory.
///
/// Every write is first appended as one line to `<run_id>.history.jsonl`.
/// The current aggregate lives in `<run_id>.json` and is replaced atomically
/// through a synced temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    directory: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStatusStore {
    /// Opens a store rooted at `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;
        Ok(Self {
            directory,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn document_path(&self, run_id: Uuid) -> PathBuf {
        self.directory
            .join(format!("{run_id}.{DOCUMENT_EXTENSION}"))
    }

    fn temporary_path(&self, run_id: Uuid) -> PathBuf {
        self.directory
            .join(format!("{run_id}.{DOCUMENT_EXTENSION}.tmp"))
    }

    fn history_path(&self, run_id: Uuid) -> PathBuf {
        self.directory.join(format!("{run_id}{HISTORY_SUFFIX}"))
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn get(&self, run_id: Uuid) -> Result<Option<AggregateStatus>, StoreError> {
        match fs::read(self.document_path(run_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, run_id: Uuid, status: AggregateStatus) -> Result<(), StoreError> {
        let document = serde_json::to_vec_pretty(&status)?;
        let mut history_line = serde_json::to_vec(&status)?;
        history_line.push(b'\n');

        let _guard = self.write_lock.lock().await;

        // History first, so the audit log never lags the current document.
        let mut history = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(run_id))
            .await?;
        history.write_all(&history_line).await?;
        history.sync_data().await?;

        let temporary = self.temporary_path(run_id);
        let mut file = fs::File::create(&temporary).await?;
        file.write_all(&document).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temporary, self.document_path(run_id)).await?;

        debug!(%run_id, directory = %self.directory.display(), "Persisted migration status");
        Ok(())
    }

    async fn history(&self, run_id: Uuid) -> Result<Vec<AggregateStatus>, StoreError> {
        let contents = match fs::read_to_string(self.history_path(run_id)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }

    async fn run_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut entries = fs::read_dir(&self.directory).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
