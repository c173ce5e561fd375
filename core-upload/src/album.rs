//! # Album Placement Strategy
//!
//! After a directory's files are uploaded, the surviving staged uploads are
//! handed to an [`AddToAlbumStrategy`] that decides how they become durable
//! items: the default strategy creates them directly inside the target
//! album, but alternative strategies (create first, then link; create
//! without an album) can be slotted in without touching the orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::photos::{Album, MediaItem};
use bridge_traits::progress::ProgressSink;
use bridge_traits::state::ItemState;
use futures::future::BoxFuture;

use crate::error::Result;

/// Outcome of the upload stage for one file: either its latest durable
/// record, or the message of the failure that stopped it.
#[derive(Debug, Clone)]
pub struct PathState {
    pub path: PathBuf,
    pub state: std::result::Result<ItemState, String>,
}

impl PathState {
    pub fn new(path: impl Into<PathBuf>, state: std::result::Result<ItemState, String>) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }

    /// A staged upload still waiting to be exchanged for a media item.
    pub fn pending(&self) -> bool {
        matches!(
            &self.state,
            Ok(item_state) if item_state.media_id.is_none() && item_state.upload_state.is_some()
        )
    }
}

/// A created media item attributed to its source file.
#[derive(Debug, Clone)]
pub struct PathMediaItem {
    pub path: PathBuf,
    pub item: MediaItem,
}

pub type CreateMediaItemsFuture = BoxFuture<'static, Result<Vec<PathMediaItem>>>;

/// Batch-create callback handed to the strategy. Takes the target album id
/// and the upload-stage outcomes; stages with no pending token are skipped.
pub type CreateMediaItemsFn =
    Arc<dyn Fn(Option<String>, Vec<PathState>) -> CreateMediaItemsFuture + Send + Sync>;

/// Read-only view into the orchestrator's in-memory records, for strategies
/// that need to consult a file's latest known state.
pub type ItemStateLookupFn = Arc<dyn Fn(&Path) -> Option<ItemState> + Send + Sync>;

/// Policy for turning a directory's staged uploads into album contents.
#[async_trait]
pub trait AddToAlbumStrategy: Send + Sync {
    async fn add_to_album(
        &self,
        path_states: Vec<PathState>,
        album: Option<Album>,
        file_progress: Arc<dyn ProgressSink>,
        create_media_items: CreateMediaItemsFn,
        item_state: ItemStateLookupFn,
    ) -> Result<()>;
}

/// Default strategy: create the media items directly inside the album in a
/// single pass. Per-item and per-chunk failures are reported through the
/// progress sink by the create callback itself.
#[derive(Debug, Clone, Default)]
pub struct CreateWithAlbumStrategy;

#[async_trait]
impl AddToAlbumStrategy for CreateWithAlbumStrategy {
    async fn add_to_album(
        &self,
        path_states: Vec<PathState>,
        album: Option<Album>,
        _file_progress: Arc<dyn ProgressSink>,
        create_media_items: CreateMediaItemsFn,
        _item_state: ItemStateLookupFn,
    ) -> Result<()> {
        create_media_items(album.map(|a| a.id), path_states).await?;
        Ok(())
    }
}
