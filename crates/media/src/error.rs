use std::{io, time::Duration};

/// Extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The video is longer than the configured limit. Raised from metadata,
    /// before anything is downloaded.
    #[error("video is {}s long, limit is {}s", duration.as_secs(), limit.as_secs())]
    DurationLimit { duration: Duration, limit: Duration },

    /// The source wants a login, cookies or an age confirmation.
    #[error("source requires authentication: {message}")]
    AuthRequired { message: String },

    #[error("extractor failed: {message}")]
    Failed { message: String },

    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid extractor metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// User-facing class of this error.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::DurationLimit { limit, .. } => FailureKind::DurationLimit { limit: *limit },
            Self::AuthRequired { .. } => FailureKind::AuthRequired,
            _ => FailureKind::Generic,
        }
    }
}

/// How a failed request is reported to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DurationLimit { limit: Duration },
    AuthRequired,
    Generic,
}

impl FailureKind {
    /// Text that replaces the status message.
    #[must_use]
    pub fn user_message(self) -> String {
        match self {
            Self::DurationLimit { limit } => {
                let secs = limit.as_secs();
                let limit = if secs >= 60 && secs % 60 == 0 {
                    format!("{} min", secs / 60)
                } else {
                    format!("{secs} s")
                };
                format!("⏱ The video is too long: the limit is {limit}.")
            },
            Self::AuthRequired => {
                "🔒 This video needs a login or is age-restricted, it can't be downloaded.".into()
            },
            Self::Generic => "❌ Failed to process the video.".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
