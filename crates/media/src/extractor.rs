use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{error::Result, progress::DownloadProgress};

/// Metadata reported by the extractor for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub id: String,
    pub title: Option<String>,
    pub duration: Option<Duration>,
    pub ext: Option<String>,
}

/// A finished download. `path` always lies inside the request's output
/// directory.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub info: MediaInfo,
}

/// One extraction job.
pub struct ExtractRequest<'a> {
    pub url: &'a str,
    /// Directory owned by this request. Created by the extractor only after
    /// the duration check passes.
    pub output_dir: &'a Path,
    /// Reject videos longer than this, before downloading.
    pub max_duration: Option<Duration>,
    /// Receives progress updates. Updates are dropped if the receiver lags.
    pub progress: Option<mpsc::Sender<DownloadProgress>>,
}

/// Fetches a video from a source URL into a local file.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn extract(&self, request: ExtractRequest<'_>) -> Result<DownloadedMedia>;
}
