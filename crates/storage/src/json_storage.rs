//! JSON file snapshot store.
//!
//! Keeps the latest snapshot as `snapshot.json` under a root directory, with
//! a small meta marker (version + updated_at) in `meta/`. Writes go to a
//! temporary file first and are renamed into place.

use std::path::{Path, PathBuf};

use roadmap_core::Snapshot;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Result, SnapshotMeta, SnapshotStore, StorageError};

const SNAPSHOT_FILE: &str = "snapshot.json";
const META_FILE: &str = "snapshot.meta.json";

/// File-based JSON snapshot store.
pub struct JsonSnapshotStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSnapshotStore {
    /// Create the store, making `root` and its `meta/` directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join("meta")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory the store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join("meta").join(META_FILE)
    }

    /// Read and increment the version marker, return the new meta.
    async fn bump_version(&self, snapshot: &Snapshot) -> Result<SnapshotMeta> {
        let version = match read_json::<SnapshotMeta>(&self.meta_path()).await {
            Ok(Some(meta)) => meta.version,
            // An unreadable marker restarts the count
            _ => 0,
        };
        let meta = SnapshotMeta {
            version: version + 1,
            updated_at: chrono::Utc::now(),
            cycle_id: snapshot.cycle_id,
        };
        write_atomic(&self.meta_path(), &serde_json::to_vec_pretty(&meta)?).await?;
        Ok(meta)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.snapshot_path(), &json).await?;

        let meta = self.bump_version(snapshot).await?;
        debug!("Saved snapshot version {} to {}", meta.version, self.root.display());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        read_json(&self.snapshot_path()).await
    }

    async fn load_meta(&self) -> Result<Option<SnapshotMeta>> {
        read_json(&self.meta_path()).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::Other(format!("invalid path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
