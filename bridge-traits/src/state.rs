//! Durable Upload State
//!
//! The per-file record that makes the upload process resumable, plus the
//! store contract that persists it across restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// The staged-upload half of a file's record: the opaque token returned by
/// the service and the instant it was obtained. Tokens are only honoured by
/// the service for a limited window, so the instant decides re-upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMediaItemState {
    pub token: String,
    pub upload_instant: DateTime<Utc>,
}

impl UploadMediaItemState {
    pub fn new(token: impl Into<String>, upload_instant: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            upload_instant,
        }
    }
}

/// Durable per-file upload record.
///
/// Immutable value: every transition produces a new record which the caller
/// persists through the [`UploadStateStore`]. A `media_id` is only ever
/// stamped onto a record that already carries an `upload_state`; once it is
/// present the file is durably complete and never re-uploaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub upload_state: Option<UploadMediaItemState>,
    pub media_id: Option<String>,
}

impl ItemState {
    /// Record for a freshly staged upload, not yet exchanged for an item.
    pub fn uploaded(upload_state: UploadMediaItemState) -> Self {
        Self {
            upload_state: Some(upload_state),
            media_id: None,
        }
    }

    /// New record with the durable remote id stamped on.
    pub fn with_media_id(&self, media_id: impl Into<String>) -> Self {
        debug_assert!(
            self.upload_state.is_some(),
            "media id stamped onto a record with no upload state"
        );
        Self {
            upload_state: self.upload_state.clone(),
            media_id: Some(media_id.into()),
        }
    }

    /// Durably complete: the remote item exists regardless of token age.
    pub fn is_complete(&self) -> bool {
        self.media_id.is_some()
    }
}

/// Durable mapping from file path to last-known [`ItemState`].
///
/// Implementations serialize their own writes; the core issues saves in
/// transition order for any given path but does not coordinate across paths.
#[async_trait]
pub trait UploadStateStore: Send + Sync {
    /// Snapshot of every persisted record, keyed by absolute path.
    async fn load_all(&self) -> Result<HashMap<PathBuf, ItemState>, StoreError>;

    /// Persist the latest record for `path`, replacing any previous one.
    async fn save(&self, path: &Path, state: &ItemState) -> Result<(), StoreError>;

    /// Drop all persisted records; the next run starts from scratch.
    async fn forget_all(&self) -> Result<(), StoreError>;
}
