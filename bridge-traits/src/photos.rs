//! Remote Photo Service Contract
//!
//! Wire-level types and the transport trait for the remote photo-storage
//! service. Only the two calls the upload core drives are modelled: staging
//! raw bytes for an upload token, and exchanging a batch of tokens for
//! durable media items.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Remote album handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
}

impl Album {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// One entry of a batched "create media items" request: a staged upload
/// token plus the display file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub upload_token: String,
    pub file_name: String,
}

/// Durable remote item created from a staged upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
}

impl MediaItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Per-entry failure status in a batch-create response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorStatus {
    pub code: i32,
    pub message: String,
}

/// Outcome for one entry of a batch-create call, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaItemOrError {
    Item(MediaItem),
    Error(ErrorStatus),
}

impl MediaItemOrError {
    pub fn item(&self) -> Option<&MediaItem> {
        match self {
            Self::Item(item) => Some(item),
            Self::Error(_) => None,
        }
    }

    pub fn error_status(&self) -> Option<&ErrorStatus> {
        match self {
            Self::Item(_) => None,
            Self::Error(status) => Some(status),
        }
    }
}

/// Remote photo service transport.
///
/// Implementations own the wire protocol, authentication, and connection
/// management. The upload core only drives these two calls; retry and
/// failure classification happen above this trait.
#[async_trait]
pub trait PhotosClient: Send + Sync {
    /// Stage the raw bytes of `path` with the service, returning an opaque
    /// upload token to be exchanged later for a durable media item.
    async fn upload_media_data(&self, path: &Path) -> Result<String>;

    /// Exchange up to 50 upload tokens for durable media items, optionally
    /// placing them directly into `album_id`.
    ///
    /// The response carries one entry per input item, in input order; an
    /// entry-level failure does not fail the call.
    async fn create_media_items(
        &self,
        album_id: Option<&str>,
        new_items: &[NewMediaItem],
    ) -> Result<Vec<MediaItemOrError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_item_or_error_accessors() {
        let item = MediaItemOrError::Item(MediaItem::new("abc"));
        assert_eq!(item.item().map(|i| i.id.as_str()), Some("abc"));
        assert!(item.error_status().is_none());

        let error = MediaItemOrError::Error(ErrorStatus {
            code: 7,
            message: "denied".to_string(),
        });
        assert!(error.item().is_none());
        assert_eq!(error.error_status().map(|s| s.code), Some(7));
    }
}
