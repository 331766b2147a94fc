/// Config schema types (telegram, download, router, database).
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use {
    reelay_common::types::ChatKind,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// yt-dlp format selector: a single pre-muxed mp4 first, then H.264 video plus
/// m4a audio merged locally, then whatever is best.
pub const DEFAULT_FORMAT: &str = "best[ext=mp4]/bestvideo[vcodec^=avc]+bestaudio[ext=m4a]/best";

/// Cookie files looked up per domain when the config names none.
pub const DEFAULT_COOKIES: &[(&str, &str)] = &[
    ("instagram.com", "instagram_cookies.txt"),
    ("youtube.com", "youtube_cookies.txt"),
    ("youtu.be", "youtube_cookies.txt"),
];

/// Domains (or path keywords) that route a message to the downloader.
pub const DEFAULT_DOMAINS: &[&str] = &[
    "tiktok.com",
    "youtube.com",
    "youtu.be",
    "instagram.com",
    "shorts",
];

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelayConfig {
    pub telegram: TelegramConfig,
    pub download: DownloadConfig,
    pub router: RouterConfig,
    pub database: DatabaseConfig,
}

/// Telegram bot settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Base URL of a self-hosted Bot API server (e.g. `http://telegram-bot-api:8081`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Directory shared with the local Bot API server. When set, downloaded
    /// files are moved here and sent by `file://` URI instead of uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_dir: Option<PathBuf>,

    /// Chat kinds the bot answers in.
    pub allowed_chats: Vec<ChatKind>,

    /// Delete the user's link message once it is picked up.
    pub delete_source_message: bool,

    /// Minimum interval between progress edits of the status message (ms).
    pub edit_throttle_ms: u64,
}

impl TelegramConfig {
    #[must_use]
    pub fn edit_throttle(&self) -> Duration {
        Duration::from_millis(self.edit_throttle_ms)
    }

    #[must_use]
    pub fn is_chat_allowed(&self, kind: ChatKind) -> bool {
        self.allowed_chats.contains(&kind)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("shared_dir", &self.shared_dir)
            .field("allowed_chats", &self.allowed_chats)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_url: None,
            shared_dir: None,
            allowed_chats: ChatKind::DEFAULT_ALLOWED.to_vec(),
            delete_source_message: true,
            edit_throttle_ms: 3_000,
        }
    }
}

/// Extractor (yt-dlp) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Scratch directory; every request gets its own subdirectory.
    pub dir: PathBuf,

    /// yt-dlp `-f` selector.
    pub format: String,

    /// Container used when separate streams are merged.
    pub merge_output_format: String,

    /// Longest accepted video in seconds; `0` disables the check.
    pub max_duration_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Cookie files keyed by a domain substring, e.g. `"instagram.com"`.
    pub cookies: BTreeMap<String, PathBuf>,

    /// Explicit yt-dlp binary; searched in `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ytdlp_path: Option<PathBuf>,
}

impl DownloadConfig {
    #[must_use]
    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_secs > 0).then(|| Duration::from_secs(self.max_duration_secs))
    }

    /// Cookie file whose domain key occurs in `url`, if any.
    #[must_use]
    pub fn cookie_file_for(&self, url: &str) -> Option<&Path> {
        let url = url.to_ascii_lowercase();
        self.cookies
            .iter()
            .find(|(domain, _)| url.contains(&domain.to_ascii_lowercase()))
            .map(|(_, path)| path.as_path())
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("downloads"),
            format: DEFAULT_FORMAT.into(),
            merge_output_format: "mp4".into(),
            max_duration_secs: 600,
            proxy: None,
            cookies: DEFAULT_COOKIES
                .iter()
                .map(|(domain, file)| ((*domain).to_string(), PathBuf::from(file)))
                .collect(),
            ytdlp_path: None,
        }
    }
}

/// Link routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Case-insensitive substrings; the first one found in a message wins.
    pub domains: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            domains: DEFAULT_DOMAINS.iter().map(|d| (*d).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the user registry and the media cache.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reelay.db"),
        }
    }
}
