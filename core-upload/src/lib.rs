//! # Upload Core
//!
//! Resumable photo upload engine: per-file deduplication through shared
//! futures, durable state transitions, exponential backoff with a
//! process-wide reset-on-success budget, and pluggable album placement.
//!
//! The engine is transport-agnostic. Callers supply the
//! [`bridge_traits::photos::PhotosClient`] and
//! [`bridge_traits::state::UploadStateStore`] implementations; this crate
//! owns only the orchestration between them.

pub mod album;
pub mod backoff;
pub mod error;
pub mod store;
pub mod uploader;

pub use album::{AddToAlbumStrategy, CreateWithAlbumStrategy, PathMediaItem, PathState};
pub use backoff::{
    with_backoff_and_retry, ExponentialBackoffClassifier, FatalErrorClassifier,
    RetryableErrorClassifier, RetryableFailure, StatusCodeFatalClassifier,
};
pub use error::{Result, UploadError};
pub use store::JsonFileStateStore;
pub use uploader::{Uploader, CREATE_MEDIA_ITEMS_BATCH_SIZE, UPLOAD_TOKEN_VALIDITY_HOURS};
