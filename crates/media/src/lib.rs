//! Media pipeline: URL normalization, extraction through yt-dlp, progress
//! parsing and throttling, and removal of download artifacts.

pub mod cleanup;
pub mod error;
pub mod extractor;
pub mod normalize;
pub mod progress;
pub mod ytdlp;

pub use {
    error::{Error, FailureKind, Result},
    extractor::{DownloadedMedia, ExtractRequest, MediaExtractor, MediaInfo},
    normalize::normalize_url,
    progress::{DownloadProgress, ProgressThrottle},
    ytdlp::YtDlpExtractor,
};
