//! File-backed store
//!
//! One JSON document per item at `<root>/<table>/<id>.json`. Writes go to a
//! temporary file that is renamed over the target, so a reader sees either
//! the previous item or the new one in full.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::{item_key, Item, RecordStore, StoreError};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the table directory under `root`
    pub fn new(root: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        if !is_safe_key(table) {
            return Err(StoreError::InvalidKey(table.to_string()));
        }
        let dir = root.as_ref().join(table);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Keys become file names, so only a conservative character set is allowed
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl RecordStore for FileStore {
    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let path = self.item_path(item_key(&item)?)?;
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let data = serde_json::to_vec(&item)?;
        let written = async {
            fs::write(&temp_path, data).await?;
            fs::rename(&temp_path, &path).await
        }
        .await;
        if let Err(e) = written {
            // a partial write or a failed rename both leave the temp file
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Item>, StoreError> {
        let path = self.item_path(id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("file ({})", self.dir.display())
    }
}
