//! JSON file-backed [`UploadStateStore`].
//!
//! Default store for embedders that do not bring their own persistence:
//! the whole path-to-record map lives in one JSON file, rewritten through
//! a temp-file rename on every save so a crash never leaves a torn file.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bridge_traits::error::StoreError;
use bridge_traits::state::{ItemState, UploadStateStore};
use tokio::sync::Mutex;
use tracing::debug;

pub struct JsonFileStateStore {
    file_path: PathBuf,
    states: Mutex<HashMap<PathBuf, ItemState>>,
}

impl JsonFileStateStore {
    /// Open the store at `file_path`, reading any existing records. A
    /// missing file is an empty store; a file that fails to parse is an
    /// error, since silently discarding it would re-upload everything.
    pub async fn open(file_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file_path = file_path.into();
        let states = match tokio::fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Other(format!("unreadable state file: {e}")))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(
            file = %file_path.display(),
            records = states.len(),
            "opened upload state store"
        );
        Ok(Self {
            file_path,
            states: Mutex::new(states),
        })
    }

    async fn persist(&self, states: &HashMap<PathBuf, ItemState>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(states)
            .map_err(|e| StoreError::Other(format!("failed to encode state: {e}")))?;
        let tmp_path = self.file_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.file_path).await?;
        Ok(())
    }
}

#[async_trait]
impl UploadStateStore for JsonFileStateStore {
    async fn load_all(&self) -> Result<HashMap<PathBuf, ItemState>, StoreError> {
        Ok(self.states.lock().await.clone())
    }

    async fn save(&self, path: &Path, state: &ItemState) -> Result<(), StoreError> {
        let mut states = self.states.lock().await;
        states.insert(path.to_path_buf(), state.clone());
        self.persist(&states).await
    }

    async fn forget_all(&self) -> Result<(), StoreError> {
        let mut states = self.states.lock().await;
        states.clear();
        match tokio::fs::remove_file(&self.file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::state::UploadMediaItemState;
    use chrono::Utc;

    fn temp_state_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("upload-state-{}-{}.json", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let file = temp_state_file("reopen");
        let _ = tokio::fs::remove_file(&file).await;

        let store = JsonFileStateStore::open(&file).await.unwrap();
        let state = ItemState::uploaded(UploadMediaItemState::new("tok-1", Utc::now()))
            .with_media_id("media-1");
        store.save(Path::new("/photos/a.jpg"), &state).await.unwrap();
        drop(store);

        let reopened = JsonFileStateStore::open(&file).await.unwrap();
        let loaded = reopened.load_all().await.unwrap();
        assert_eq!(loaded.get(Path::new("/photos/a.jpg")), Some(&state));

        let _ = tokio::fs::remove_file(&file).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let file = temp_state_file("missing");
        let _ = tokio::fs::remove_file(&file).await;

        let store = JsonFileStateStore::open(&file).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let file = temp_state_file("corrupt");
        tokio::fs::write(&file, b"not json").await.unwrap();

        assert!(JsonFileStateStore::open(&file).await.is_err());

        let _ = tokio::fs::remove_file(&file).await;
    }

    #[tokio::test]
    async fn test_forget_all_removes_the_file() {
        let file = temp_state_file("forget");
        let store = JsonFileStateStore::open(&file).await.unwrap();
        let state = ItemState::uploaded(UploadMediaItemState::new("tok", Utc::now()));
        store.save(Path::new("/photos/b.jpg"), &state).await.unwrap();
        assert!(tokio::fs::try_exists(&file).await.unwrap());

        store.forget_all().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(!tokio::fs::try_exists(&file).await.unwrap());

        // forgetting an already-empty store is fine
        store.forget_all().await.unwrap();
    }
}
