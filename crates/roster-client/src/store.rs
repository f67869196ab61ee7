use std::path::{Path, PathBuf};
use std::sync::Arc;

use roster_core::error::AppError;
use roster_core::models::ExtractedContact;
use roster_core::traits::{ArtifactStore, RecordSink};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// JsonlSink
// ---------------------------------------------------------------------------

/// Record sink backed by a JSON Lines file, one contact per line.
///
/// Each append is flushed before it returns, so a crashed or cancelled run
/// keeps every record it reported. Clones share one write lock.
#[derive(Clone)]
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    async fn append(&self, contact: &ExtractedContact) -> Result<(), AppError> {
        let mut line = serde_json::to_string(contact)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ExtractedContact>, AppError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (number, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExtractedContact>(line) {
                Ok(contact) => records.push(contact),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    "Skipping unreadable record: {e}"
                ),
            }
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// FsArtifactStore
// ---------------------------------------------------------------------------

/// Artifact store writing each artifact as a file in one directory.
///
/// The content type is only logged; the file name carries the format.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactStore for FsArtifactStore {
    async fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<(), AppError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(AppError::StoreError(format!("Invalid artifact name: {name:?}")));
        }

        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), content_type, size = bytes.len(), "Stored artifact");
        Ok(())
    }
}
