//! Cache lookup, download, relay and cache store for one video request.
//!
//! ```text
//! lookup ──hit──▶ send reference ──ok──▶ done
//!   │                  │
//!  miss            rejected
//!   ▼                  ▼
//! download ──▶ send file ──▶ store reference ──▶ done
//! ```
//!
//! The request directory and any file moved for a local Bot API server are
//! removed on every path out. The placeholder message is deleted on success
//! and replaced by a failure text otherwise.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use {
    reelay_config::ReelayConfig,
    reelay_media::{
        DownloadProgress, ExtractRequest, FailureKind, MediaExtractor, ProgressThrottle, cleanup,
        normalize_url,
    },
    reelay_store::MediaCache,
    teloxide::types::{ChatId, MessageId},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{
    error::{Error, Result},
    outbound::{Messenger, VideoSource},
};

/// Progress updates buffered between the extractor and the reporter.
const PROGRESS_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Parent of the per-request download directories.
    pub download_dir: PathBuf,
    /// Directory shared with a local Bot API server. Files are moved here
    /// and sent by `file://` URI instead of being uploaded.
    pub shared_dir: Option<PathBuf>,
    pub max_duration: Option<Duration>,
    /// Minimum time between two progress edits of the placeholder.
    pub progress_interval: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &ReelayConfig) -> Self {
        Self {
            download_dir: config.download.dir.clone(),
            shared_dir: config.telegram.shared_dir.clone(),
            max_duration: config.download.max_duration(),
            progress_interval: config.telegram.edit_throttle(),
        }
    }
}

/// One link to relay into a chat.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub chat_id: ChatId,
    pub source_url: String,
    /// Status message edited with progress and resolved at the end.
    pub placeholder: MessageId,
    /// Shown in the caption of freshly downloaded videos.
    pub requester: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Sent from the cache without downloading.
    Cached,
    /// Downloaded and sent. `newly_cached` is false when another request
    /// stored the reference first or Telegram returned none.
    Delivered { newly_cached: bool },
    /// The user has been told why.
    Failed(FailureKind),
}

pub struct RelayService {
    messenger: Arc<dyn Messenger>,
    cache: Arc<dyn MediaCache>,
    extractor: Arc<dyn MediaExtractor>,
    settings: RelaySettings,
}

impl RelayService {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        cache: Arc<dyn MediaCache>,
        extractor: Arc<dyn MediaExtractor>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            messenger,
            cache,
            extractor,
            settings,
        }
    }

    /// Relay `request.source_url` into the chat.
    ///
    /// Extractor and transfer failures are reported in the placeholder and
    /// returned as [`RelayOutcome::Failed`]. An `Err` means the cache could
    /// not be read; the placeholder is left for the caller.
    pub async fn relay(&self, request: &RelayRequest) -> Result<RelayOutcome> {
        let url = normalize_url(&request.source_url);
        let chat_id = request.chat_id;

        if let Some(entry) = self.cache.get(&url).await? {
            match self
                .messenger
                .send_video(chat_id, VideoSource::Reference(&entry.file_id), &cached_caption(&url))
                .await
            {
                Ok(_) => {
                    info!(chat_id = chat_id.0, url = %url, "served from cache");
                    self.delete_placeholder(request).await;
                    return Ok(RelayOutcome::Cached);
                },
                Err(e) => {
                    warn!(
                        chat_id = chat_id.0,
                        url = %url,
                        error = %e,
                        "cached reference rejected, downloading again"
                    );
                },
            }
        }

        let request_dir = cleanup::request_dir(&self.settings.download_dir);
        let mut moved = None;
        let result = self
            .fetch_and_send(request, &url, &request_dir, &mut moved)
            .await;
        self.cleanup(&request_dir, moved.as_deref()).await;

        match result {
            Ok(newly_cached) => {
                self.delete_placeholder(request).await;
                Ok(RelayOutcome::Delivered { newly_cached })
            },
            Err(e) => {
                let kind = match &e {
                    Error::Media(media) => media.failure_kind(),
                    _ => FailureKind::Generic,
                };
                warn!(chat_id = chat_id.0, url = %url, error = %e, ?kind, "relay failed");
                if let Err(edit_err) = self
                    .messenger
                    .edit_text(chat_id, request.placeholder, &kind.user_message())
                    .await
                {
                    debug!(error = %edit_err, "failed to report relay failure");
                }
                Ok(RelayOutcome::Failed(kind))
            },
        }
    }

    /// Download, send and store. Returns whether this call created the
    /// cache entry.
    async fn fetch_and_send(
        &self,
        request: &RelayRequest,
        url: &str,
        request_dir: &Path,
        moved: &mut Option<PathBuf>,
    ) -> Result<bool> {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let reporter = tokio::spawn(report_progress(
            Arc::clone(&self.messenger),
            request.chat_id,
            request.placeholder,
            rx,
            self.settings.progress_interval,
        ));

        let extracted = self
            .extractor
            .extract(ExtractRequest {
                url,
                output_dir: request_dir,
                max_duration: self.settings.max_duration,
                progress: Some(tx),
            })
            .await;
        // The sender is gone with the request; wait so no progress edit
        // lands after the placeholder is resolved.
        if let Err(e) = reporter.await {
            debug!(error = %e, "progress reporter task failed");
        }
        let media = extracted?;

        let caption = fresh_caption(&request.requester, url);
        let file_id = match &self.settings.shared_dir {
            Some(shared_dir) => {
                let target = move_to_shared(&media.path, request_dir, shared_dir).await?;
                *moved = Some(target.clone());
                let uri = Url::from_file_path(&target).map_err(|()| {
                    Error::message(format!("not an absolute path: {}", target.display()))
                })?;
                self.messenger
                    .send_video(request.chat_id, VideoSource::LocalUri(&uri), &caption)
                    .await?
            },
            None => {
                self.messenger
                    .send_video(request.chat_id, VideoSource::File(&media.path), &caption)
                    .await?
            },
        };

        let Some(file_id) = file_id else {
            warn!(url = %url, "telegram returned no reusable reference");
            return Ok(false);
        };
        match self.cache.insert_if_absent(url, &file_id).await {
            Ok(created) => {
                debug!(url = %url, created, "cache store");
                Ok(created)
            },
            Err(e) => {
                warn!(url = %url, error = %e, "failed to store cache entry");
                Ok(false)
            },
        }
    }

    async fn delete_placeholder(&self, request: &RelayRequest) {
        if let Err(e) = self
            .messenger
            .delete_message(request.chat_id, request.placeholder)
            .await
        {
            debug!(
                chat_id = request.chat_id.0,
                message_id = request.placeholder.0,
                error = %e,
                "failed to delete placeholder"
            );
        }
    }

    async fn cleanup(&self, request_dir: &Path, moved: Option<&Path>) {
        if let Err(e) = cleanup::remove_request_dir(request_dir).await {
            debug!(dir = %request_dir.display(), error = %e, "failed to remove request directory");
        }
        if let Some(path) = moved
            && let Err(e) = cleanup::remove_file(path).await
        {
            debug!(path = %path.display(), error = %e, "failed to remove shared file");
        }
    }
}

/// Edit the placeholder with progress, throttled.
async fn report_progress(
    messenger: Arc<dyn Messenger>,
    chat_id: ChatId,
    message_id: MessageId,
    mut rx: mpsc::Receiver<DownloadProgress>,
    interval: Duration,
) {
    let mut throttle = ProgressThrottle::new(interval);
    while let Some(update) = rx.recv().await {
        let text = update.status_line();
        if !throttle.admit(Instant::now(), &text) {
            continue;
        }
        if let Err(e) = messenger.edit_text(chat_id, message_id, &text).await {
            debug!(chat_id = chat_id.0, error = %e, "progress edit failed");
        }
    }
}

/// Move a download into the shared directory under a name unique to this
/// request.
async fn move_to_shared(path: &Path, request_dir: &Path, shared_dir: &Path) -> Result<PathBuf> {
    let request_id = request_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::message(format!("download has no file name: {}", path.display())))?;

    tokio::fs::create_dir_all(shared_dir).await?;
    let target = std::path::absolute(shared_dir.join(format!("{request_id}-{name}")))?;
    if tokio::fs::rename(path, &target).await.is_err() {
        // Different filesystem.
        tokio::fs::copy(path, &target).await?;
        tokio::fs::remove_file(path).await?;
    }
    Ok(target)
}

fn cached_caption(url: &str) -> String {
    format!("🚀 From cache\n🔗 {url}")
}

fn fresh_caption(requester: &str, url: &str) -> String {
    format!("👤 {requester}\n🔗 {url}")
}
