//! Test doubles for the chat and extractor seams.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    reelay_media::{
        DownloadProgress, DownloadedMedia, ExtractRequest, MediaExtractor, MediaInfo,
        Result as MediaResult,
    },
    reelay_store::{SqliteMediaCache, SqliteUserRegistry},
    teloxide::types::{ChatId, MessageId},
};

use crate::{
    error::{Error, Result},
    outbound::{Messenger, VideoSource},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentVideo {
    Reference(String),
    /// Uploaded file and whether it existed at send time.
    File { path: PathBuf, existed: bool },
    LocalUri { uri: String, existed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text { chat_id: i64, text: String },
    Edit { message_id: i32, text: String },
    Delete { message_id: i32 },
    Video { video: SentVideo, caption: String },
}

/// Records every chat mutation. Message IDs start at 100.
#[derive(Default)]
pub struct FakeMessenger {
    calls: Mutex<Vec<Call>>,
    sent: AtomicI32,
    uploads: AtomicUsize,
    pub reject_references: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_deletes: AtomicBool,
}

#[allow(clippy::unwrap_used)]
impl FakeMessenger {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upload_actions(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn videos(&self) -> Vec<(SentVideo, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Video { video, caption } => Some((video, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.record(Call::Text {
            chat_id: chat_id.0,
            text: text.to_string(),
        });
        Ok(MessageId(100 + self.sent.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_text(&self, _chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.record(Call::Edit {
            message_id: message_id.0,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: ChatId, message_id: MessageId) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::message("Bad Request: message can't be deleted"));
        }
        self.record(Call::Delete {
            message_id: message_id.0,
        });
        Ok(())
    }

    async fn send_video(
        &self,
        _chat_id: ChatId,
        video: VideoSource<'_>,
        caption: &str,
    ) -> Result<Option<String>> {
        let (sent, file_id) = match video {
            VideoSource::Reference(id) => {
                if self.reject_references.load(Ordering::SeqCst) {
                    return Err(Error::message("Bad Request: wrong file identifier"));
                }
                (SentVideo::Reference(id.to_string()), id.to_string())
            },
            VideoSource::File(path) => {
                if self.fail_uploads.load(Ordering::SeqCst) {
                    return Err(Error::message("Request Entity Too Large"));
                }
                let video = SentVideo::File {
                    path: path.to_path_buf(),
                    existed: path.exists(),
                };
                (video, format!("uploaded-{}", file_name(path)))
            },
            VideoSource::LocalUri(uri) => {
                let path = uri.to_file_path().unwrap_or_default();
                let video = SentVideo::LocalUri {
                    uri: uri.to_string(),
                    existed: path.exists(),
                };
                (video, format!("local-{}", file_name(&path)))
            },
        };
        self.record(Call::Video {
            video: sent,
            caption: caption.to_string(),
        });
        Ok(Some(file_id))
    }

    async fn send_upload_action(&self, _chat_id: ChatId) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extractor that writes a small file instead of running yt-dlp.
pub struct FakeExtractor {
    duration: Duration,
    progress: Vec<f32>,
    delay: Duration,
    auth_required: bool,
    fail_midway: bool,
    calls: AtomicUsize,
    output_dirs: Mutex<Vec<PathBuf>>,
}

#[allow(clippy::unwrap_used)]
impl FakeExtractor {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            progress: Vec::new(),
            delay: Duration::ZERO,
            auth_required: false,
            fail_midway: false,
            calls: AtomicUsize::new(0),
            output_dirs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_progress(mut self, percents: &[f32]) -> Self {
        self.progress = percents.to_vec();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requiring_auth(mut self) -> Self {
        self.auth_required = true;
        self
    }

    /// Leave a partial file in the request dir, then fail like a dropped
    /// connection would.
    pub fn failing_midway(mut self) -> Self {
        self.fail_midway = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn output_dirs(&self) -> Vec<PathBuf> {
        self.output_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    #[allow(clippy::unwrap_used)]
    async fn extract(&self, request: ExtractRequest<'_>) -> MediaResult<DownloadedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.output_dirs
            .lock()
            .unwrap()
            .push(request.output_dir.to_path_buf());

        if let Some(limit) = request.max_duration
            && self.duration > limit
        {
            return Err(reelay_media::Error::DurationLimit {
                duration: self.duration,
                limit,
            });
        }
        if self.auth_required {
            return Err(reelay_media::Error::AuthRequired {
                message: "Sign in to confirm your age".into(),
            });
        }

        tokio::fs::create_dir_all(request.output_dir).await?;
        if let Some(tx) = &request.progress {
            for percent in &self.progress {
                let _ = tx
                    .send(DownloadProgress {
                        percent: Some(*percent),
                        text: format!("{percent:.1}%"),
                    })
                    .await;
            }
        }
        tokio::time::sleep(self.delay).await;

        if self.fail_midway {
            tokio::fs::write(request.output_dir.join("abc123.mp4.part"), b"vid").await?;
            return Err(reelay_media::Error::failed(
                "ERROR: unable to download video data: HTTP Error 403: Forbidden",
            ));
        }

        let path = request.output_dir.join("abc123.mp4");
        tokio::fs::write(&path, b"video").await?;
        Ok(DownloadedMedia {
            path,
            info: MediaInfo {
                id: "abc123".into(),
                title: Some("Clip".into()),
                duration: Some(self.duration),
                ext: Some("mp4".into()),
            },
        })
    }
}

/// SQLite-backed cache and user registry in `dir`, migrated.
#[allow(clippy::expect_used)]
pub async fn sqlite_stores(dir: &Path) -> (Arc<SqliteMediaCache>, Arc<SqliteUserRegistry>) {
    let pool = reelay_store::connect(&dir.join("reelay.db"))
        .await
        .expect("open test database");
    reelay_store::run_migrations(&pool)
        .await
        .expect("run migrations");
    (
        Arc::new(SqliteMediaCache::new(pool.clone())),
        Arc::new(SqliteUserRegistry::new(pool)),
    )
}
