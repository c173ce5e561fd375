//! # Upload Orchestrator
//!
//! Resumable, deduplicated photo upload engine.
//!
//! ## Overview
//!
//! The orchestrator keeps one shared future per file path. Any number of
//! concurrent directory operations touching the same file attach to the
//! same in-flight upload instead of staging the bytes twice; completed
//! records are consulted before scheduling so a file whose upload token is
//! still fresh, or whose media item already exists, is never re-uploaded.
//!
//! Every record transition (staged upload, stamped media id) is persisted
//! through the [`UploadStateStore`] as it happens, so a crashed or stopped
//! run resumes from the last durable record on [`Uploader::start`].
//!
//! Remote calls are guarded by the backoff protocol in [`crate::backoff`];
//! the two classifiers are shared across the whole engine so any success
//! anywhere resets the consecutive-failure budget.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::error::{code_name, RemoteApiError};
use bridge_traits::photos::{Album, MediaItemOrError, NewMediaItem, PhotosClient};
use bridge_traits::progress::{KeyedError, ProgressSink};
use bridge_traits::state::{ItemState, UploadMediaItemState, UploadStateStore};
use bridge_traits::time::Clock;
use core_runtime::config::UploadSettings;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::album::{
    AddToAlbumStrategy, CreateMediaItemsFn, ItemStateLookupFn, PathMediaItem, PathState,
};
use crate::backoff::{with_backoff_and_retry, FatalErrorClassifier, RetryableErrorClassifier};
use crate::error::{Result, UploadError};

/// Hard service limit on one batch-create call.
pub const CREATE_MEDIA_ITEMS_BATCH_SIZE: usize = 50;

/// How long a staged upload token stays usable. The service honours tokens
/// for a day; the margin absorbs clock skew and in-flight time.
pub const UPLOAD_TOKEN_VALIDITY_HOURS: i64 = 23;

/// Shared handle to one file's in-flight or settled upload record.
type SharedItemStateFuture =
    Shared<BoxFuture<'static, std::result::Result<ItemState, RemoteApiError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Running,
    Stopped,
}

/// Lock-free lifecycle cell. A plain atomic is enough: transitions are rare
/// and per-operation checks only need the latest value.
struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    fn get(&self) -> Lifecycle {
        match self.0.load(Ordering::SeqCst) {
            1 => Lifecycle::Running,
            2 => Lifecycle::Stopped,
            _ => Lifecycle::NotStarted,
        }
    }

    fn set(&self, lifecycle: Lifecycle) {
        let value = match lifecycle {
            Lifecycle::NotStarted => 0,
            Lifecycle::Running => 1,
            Lifecycle::Stopped => 2,
        };
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Cheaply cloneable handle to the upload engine.
#[derive(Clone)]
pub struct Uploader {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn PhotosClient>,
    state_store: Arc<dyn UploadStateStore>,
    clock: Arc<dyn Clock>,
    backoff: Arc<dyn RetryableErrorClassifier>,
    fatal: Arc<dyn FatalErrorClassifier>,
    album_strategy: Arc<dyn AddToAlbumStrategy>,

    /// Caps concurrent `upload_media_data` calls.
    upload_permits: Arc<Semaphore>,

    /// One shared future per path. Reads, completions and replacements all
    /// go through the entry API so concurrent callers for the same path
    /// observe a single consistent record.
    item_state_by_path: DashMap<PathBuf, SharedItemStateFuture>,

    lifecycle: LifecycleCell,
    forget_state_on_shutdown: AtomicBool,
}

impl Uploader {
    pub fn new(
        client: Arc<dyn PhotosClient>,
        state_store: Arc<dyn UploadStateStore>,
        clock: Arc<dyn Clock>,
        backoff: Arc<dyn RetryableErrorClassifier>,
        fatal: Arc<dyn FatalErrorClassifier>,
        album_strategy: Arc<dyn AddToAlbumStrategy>,
        settings: &UploadSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                state_store,
                clock,
                backoff,
                fatal,
                album_strategy,
                upload_permits: Arc::new(Semaphore::new(settings.max_concurrent_uploads)),
                item_state_by_path: DashMap::new(),
                lifecycle: LifecycleCell::new(),
                forget_state_on_shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Load persisted records and accept upload operations.
    ///
    /// Every persisted record becomes a settled in-memory entry, so resumed
    /// files go through the same freshness checks as files uploaded in this
    /// run. Fails if the engine is already running.
    pub async fn start(&self) -> Result<()> {
        if self.inner.lifecycle.get() == Lifecycle::Running {
            return Err(UploadError::AlreadyStarted);
        }

        let persisted = self.inner.state_store.load_all().await?;
        let resumed = persisted.len();
        for (path, state) in persisted {
            let future: SharedItemStateFuture = async move { Ok(state) }.boxed().shared();
            self.inner.item_state_by_path.insert(path, future);
        }

        self.inner.lifecycle.set(Lifecycle::Running);
        info!(resumed, "uploader started");
        Ok(())
    }

    /// Stop accepting operations. If [`forget_upload_state_on_shutdown`]
    /// was requested, the persisted records are dropped first.
    ///
    /// [`forget_upload_state_on_shutdown`]: Self::forget_upload_state_on_shutdown
    pub async fn stop(&self) -> Result<()> {
        if self
            .inner
            .forget_state_on_shutdown
            .swap(false, Ordering::SeqCst)
        {
            self.inner.forget_upload_state().await?;
        }
        self.inner.lifecycle.set(Lifecycle::Stopped);
        info!("uploader stopped");
        Ok(())
    }

    /// Drop all upload state now, durable and in-memory. Subsequent
    /// operations re-upload everything.
    pub async fn do_not_resume(&self) -> Result<()> {
        self.check_started()?;
        self.inner.forget_upload_state().await
    }

    /// Arrange for [`stop`](Self::stop) to drop all upload state.
    pub fn forget_upload_state_on_shutdown(&self) {
        self.inner
            .forget_state_on_shutdown
            .store(true, Ordering::SeqCst);
    }

    /// Latest settled record for `path`, if any. In-flight uploads and
    /// failures yield `None`.
    pub fn item_state(&self, path: &Path) -> Option<ItemState> {
        self.inner.item_state(path)
    }

    /// Upload `files` and place the resulting media items per the album
    /// strategy.
    ///
    /// Files are processed concurrently under the engine's upload pool.
    /// A failure of one file never stops its siblings: unrecoverable and
    /// user-correctable failures alike are reported to `file_progress` as
    /// per-file errors, and the album stage runs over whatever survived.
    /// Only a store failure or a non-correctable batch-create failure aborts
    /// the operation.
    pub async fn upload_directory(
        &self,
        album: Option<Album>,
        mut files: Vec<PathBuf>,
        dir_progress: Arc<dyn ProgressSink>,
        file_progress: Arc<dyn ProgressSink>,
    ) -> Result<()> {
        self.check_started()?;

        dir_progress.update_description(album.as_ref().map(|a| a.title.as_str()).unwrap_or(""));
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        info!(
            files = files.len(),
            album = album.as_ref().map(|a| a.title.as_str()).unwrap_or("<none>"),
            "uploading directory"
        );

        let mut tasks = Vec::with_capacity(files.len());
        for path in files {
            let inner = Arc::clone(&self.inner);
            let progress = Arc::clone(&file_progress);
            tasks.push(async move {
                let absolute = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
                progress.update_description(&absolute.display().to_string());
                let outcome = inner.create_media_data(&path, progress.as_ref()).await;
                (path, outcome)
            });
        }

        let mut path_states = Vec::new();
        for (path, outcome) in join_all(tasks).await {
            match outcome {
                Ok(Ok(state)) => {
                    file_progress.increment_success();
                    path_states.push(PathState::new(path, Ok(state)));
                }
                Ok(Err(message)) => {
                    file_progress.add_failure(KeyedError::new(&path, message.clone()));
                    path_states.push(PathState::new(path, Err(message)));
                }
                Err(error) => {
                    let message = error.to_string();
                    file_progress.add_failure(KeyedError::new(&path, message.clone()));
                    path_states.push(PathState::new(path, Err(message)));
                }
            }
        }

        let create_inner = Arc::clone(&self.inner);
        let create_progress = Arc::clone(&file_progress);
        let create_media_items: CreateMediaItemsFn = Arc::new(move |album_id, path_states| {
            let inner = Arc::clone(&create_inner);
            let progress = Arc::clone(&create_progress);
            async move { inner.create_media_items(album_id, progress, path_states).await }.boxed()
        });

        let lookup_inner = Arc::clone(&self.inner);
        let item_state: ItemStateLookupFn = Arc::new(move |path| lookup_inner.item_state(path));

        self.inner
            .album_strategy
            .add_to_album(path_states, album, file_progress, create_media_items, item_state)
            .await
    }

    fn check_started(&self) -> Result<()> {
        match self.inner.lifecycle.get() {
            Lifecycle::Running => Ok(()),
            _ => Err(UploadError::NotStarted),
        }
    }
}

impl Inner {
    /// Drive one file through the upload stage to a settled record.
    ///
    /// The outer `Result` is the operation's own failure (store failure,
    /// retry budget exhausted); the inner one distinguishes a settled record
    /// from a user-correctable failure message.
    async fn create_media_data(
        &self,
        path: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<std::result::Result<ItemState, String>> {
        loop {
            let future = self.schedule_or_reuse(path);
            match future.await {
                Ok(state) => {
                    self.state_store.save(path, &state).await?;
                    self.backoff.reset();
                    return Ok(Ok(state));
                }
                Err(error) => {
                    let operation = format!("uploading file {}", path.display());
                    if let Some(message) = self.fatal.classify(&operation, &error) {
                        return Ok(Err(message));
                    }
                    match self.backoff.classify(&operation, &error) {
                        Some(delay_ms) => {
                            progress.on_backoff_delay(delay_ms);
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        }
                        None => return Err(error.into()),
                    }
                }
            }
        }
    }

    /// Return the shared future to await for `path`, scheduling a fresh
    /// upload only when no usable one exists.
    ///
    /// The decision runs inside the map entry, so two concurrent callers
    /// for the same path cannot both schedule. A settled failure or an
    /// expired token is replaced in place; anything in flight, durably
    /// complete, or carrying a fresh token is reused.
    fn schedule_or_reuse(&self, path: &Path) -> SharedItemStateFuture {
        match self.item_state_by_path.entry(path.to_path_buf()) {
            Entry::Vacant(entry) => {
                info!(file = %path.display(), "scheduling upload");
                let future = self.spawn_upload_task(path);
                entry.insert(future.clone());
                future
            }
            Entry::Occupied(mut entry) => {
                let current = entry.get().clone();
                // A never-polled ready future probes as complete here
                // without disturbing the entry's own copy.
                match current.clone().now_or_never() {
                    None => current,
                    Some(Err(_)) => {
                        info!(file = %path.display(), "previous upload failed, rescheduling");
                        let future = self.spawn_upload_task(path);
                        *entry.get_mut() = future.clone();
                        future
                    }
                    Some(Ok(state)) => {
                        if state.is_complete() {
                            debug!(file = %path.display(), "media item already exists, skipping");
                            current
                        } else if state
                            .upload_state
                            .as_ref()
                            .is_some_and(|upload| self.upload_token_not_expired(upload))
                        {
                            info!(file = %path.display(), "already uploaded, skipping");
                            current
                        } else {
                            info!(file = %path.display(), "upload token expired, re-uploading");
                            let future = self.spawn_upload_task(path);
                            *entry.get_mut() = future.clone();
                            future
                        }
                    }
                }
            }
        }
    }

    /// Stage the file's bytes on a pooled task, recording the instant the
    /// token was obtained.
    fn spawn_upload_task(&self, path: &Path) -> SharedItemStateFuture {
        let client = Arc::clone(&self.client);
        let clock = Arc::clone(&self.clock);
        let permits = Arc::clone(&self.upload_permits);
        let path = path.to_path_buf();

        let handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| RemoteApiError::Transport("upload pool closed".to_string()))?;
            let token = client.upload_media_data(&path).await?;
            Ok(ItemState::uploaded(UploadMediaItemState::new(
                token,
                clock.now(),
            )))
        });

        async move {
            handle
                .await
                .map_err(|e| RemoteApiError::Transport(format!("upload task failed: {e}")))?
        }
        .boxed()
        .shared()
    }

    fn upload_token_not_expired(&self, upload_state: &UploadMediaItemState) -> bool {
        let expiry =
            upload_state.upload_instant + chrono::Duration::hours(UPLOAD_TOKEN_VALIDITY_HOURS);
        let fresh = expiry > self.clock.now();
        if !fresh {
            debug!(expired_at = %expiry, "upload token expired");
        }
        fresh
    }

    /// Exchange pending upload tokens for durable media items in batches.
    ///
    /// Per-item response errors and user-correctable batch failures are
    /// reported to the sink and the remaining chunks still run; any other
    /// batch failure aborts. Successfully created items have their media id
    /// stamped onto the in-memory record and persisted before returning.
    async fn create_media_items(
        &self,
        album_id: Option<String>,
        file_progress: Arc<dyn ProgressSink>,
        path_states: Vec<PathState>,
    ) -> Result<Vec<PathMediaItem>> {
        let pending: Vec<PathState> = path_states.into_iter().filter(PathState::pending).collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for chunk in pending.chunks(CREATE_MEDIA_ITEMS_BATCH_SIZE) {
            let new_items: Vec<NewMediaItem> = chunk
                .iter()
                .map(|path_state| NewMediaItem {
                    upload_token: path_state
                        .state
                        .as_ref()
                        .ok()
                        .and_then(|s| s.upload_state.as_ref())
                        .map(|upload| upload.token.clone())
                        .unwrap_or_default(),
                    file_name: path_state
                        .path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                })
                .collect();

            debug!(items = new_items.len(), "creating media items batch");
            let call_result = with_backoff_and_retry(
                self.backoff.as_ref(),
                "create media items",
                || {
                    let client = Arc::clone(&self.client);
                    let album_id = album_id.clone();
                    let items = new_items.clone();
                    async move { client.create_media_items(album_id.as_deref(), &items).await }
                },
                |delay_ms| file_progress.on_backoff_delay(delay_ms),
            )
            .await;

            match call_result {
                Ok(responses) => {
                    if responses.len() != chunk.len() {
                        return Err(UploadError::Internal(format!(
                            "create media items returned {} results for {} new items",
                            responses.len(),
                            chunk.len()
                        )));
                    }
                    for (path_state, response) in chunk.iter().zip(responses) {
                        match response {
                            MediaItemOrError::Item(item) => {
                                if let Some(stamped) = self.stamp_media_id(&path_state.path, &item.id)
                                {
                                    if let Err(error) = stamped.await {
                                        warn!(
                                            file = %path_state.path.display(),
                                            error = %error,
                                            "created item could not be recorded in memory"
                                        );
                                    }
                                }
                                created.push(PathMediaItem {
                                    path: path_state.path.clone(),
                                    item,
                                });
                            }
                            MediaItemOrError::Error(status) => {
                                file_progress.add_failure(KeyedError::new(
                                    &path_state.path,
                                    format!("{}: {}", code_name(status.code), status.message),
                                ));
                            }
                        }
                    }
                }
                Err(error) => {
                    if let Some(message) = self.fatal.classify("create media items", &error) {
                        for path_state in chunk {
                            file_progress
                                .add_failure(KeyedError::new(&path_state.path, message.clone()));
                        }
                    } else {
                        return Err(error.into());
                    }
                }
            }
        }

        Ok(created)
    }

    /// Replace the path's record with one carrying the durable media id and
    /// persist it. Returns the chained future for the caller to drive; a
    /// store failure at this point is logged but does not unwind the created
    /// item.
    fn stamp_media_id(
        &self,
        path: &Path,
        media_id: &str,
    ) -> Option<SharedItemStateFuture> {
        let mut entry = self.item_state_by_path.get_mut(path)?;
        let previous = entry.value().clone();
        let store = Arc::clone(&self.state_store);
        let media_id = media_id.to_string();
        let path = path.to_path_buf();

        let chained: SharedItemStateFuture = async move {
            let state = previous.await?;
            let stamped = state.with_media_id(media_id);
            if let Err(error) = store.save(&path, &stamped).await {
                warn!(
                    file = %path.display(),
                    error = %error,
                    "failed to persist media id, record kept in memory"
                );
            }
            Ok(stamped)
        }
        .boxed()
        .shared();

        *entry.value_mut() = chained.clone();
        drop(entry);
        Some(chained)
    }

    /// Drop every durable record and the in-memory map behind it. The
    /// store goes first, so a store failure leaves the map intact for a
    /// later retry.
    async fn forget_upload_state(&self) -> Result<()> {
        info!(
            entries = self.item_state_by_path.len(),
            "forgetting upload state"
        );
        self.state_store.forget_all().await?;
        self.item_state_by_path.clear();
        Ok(())
    }

    fn item_state(&self, path: &Path) -> Option<ItemState> {
        let future = self.item_state_by_path.get(path)?.value().clone();
        future.now_or_never()?.ok()
    }
}
