//! # Collaborator Bridge Traits
//!
//! Contracts between the upload core and its external collaborators.
//!
//! ## Overview
//!
//! This crate defines the seams of the upload engine. Each trait represents a
//! capability the core consumes but does not implement: the remote photo
//! service transport, the durable per-file state store, progress reporting,
//! and the time source. Concrete adapters (HTTP transport, on-disk store,
//! UI progress widgets) live entirely outside this workspace.
//!
//! ## Traits
//!
//! - [`PhotosClient`](photos::PhotosClient) - raw-bytes upload and batched item creation
//! - [`UploadStateStore`](state::UploadStateStore) - durable path → [`ItemState`](state::ItemState) mapping
//! - [`ProgressSink`](progress::ProgressSink) - per-directory and per-file progress reporting
//! - [`Clock`](time::Clock) - time source for deterministic token-expiry testing
//!
//! ## Error Handling
//!
//! Remote calls surface [`RemoteApiError`](error::RemoteApiError); its
//! gRPC-style status codes are what the core's failure classifiers inspect.
//! Store operations surface [`StoreError`](error::StoreError).
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; the core schedules work across async
//! tasks and may invoke any collaborator from several tasks at once.

pub mod error;
pub mod photos;
pub mod progress;
pub mod state;
pub mod time;

pub use error::{RemoteApiError, StoreError};

// Re-export commonly used types
pub use photos::{Album, ErrorStatus, MediaItem, MediaItemOrError, NewMediaItem, PhotosClient};
pub use progress::{KeyedError, ProgressSink};
pub use state::{ItemState, UploadMediaItemState, UploadStateStore};
pub use time::{Clock, SystemClock};
