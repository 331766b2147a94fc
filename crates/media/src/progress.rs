//! Download progress reporting.

use std::{
    borrow::Cow,
    sync::LazyLock,
    time::{Duration, Instant},
};

use regex::Regex;

/// ANSI CSI escape sequences, e.g. the colour codes around `[download]`.
#[allow(clippy::expect_used)]
static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI pattern"));

/// `[download]  42.3% of ...`; the capture is the percentage.
#[allow(clippy::expect_used)]
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+(\d{1,3}(?:\.\d+)?)%").expect("valid progress pattern")
});

/// One progress update, already formatted for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub percent: Option<f32>,
    pub text: String,
}

impl DownloadProgress {
    /// Status line shown in the chat while downloading.
    #[must_use]
    pub fn status_line(&self) -> String {
        match self.percent {
            Some(percent) => format!("⏳ Downloading... {percent:.1}%"),
            None => format!("⏳ Downloading... {}", self.text),
        }
    }
}

/// Parse a `[download]` progress line from yt-dlp output.
///
/// Returns `None` for anything that is not a percentage update, including
/// destination and merge notices.
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let clean = strip_ansi(line);
    let clean = clean.trim();
    let number = PROGRESS_RE.captures(clean)?.get(1)?;

    let percent: f32 = number.as_str().parse().ok()?;
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }

    let text = clean[number.start()..]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Some(DownloadProgress {
        percent: Some(percent),
        text,
    })
}

fn strip_ansi(input: &str) -> Cow<'_, str> {
    ANSI_RE.replace_all(input, "")
}

/// Rate limiter for status edits.
///
/// The first update is always admitted. After that at most one update per
/// `interval` gets through, and an update whose text equals the last
/// admitted one is dropped.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<(Instant, String)>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn admit(&mut self, now: Instant, text: &str) -> bool {
        if let Some((at, last_text)) = &self.last
            && (last_text == text || now.saturating_duration_since(*at) < self.interval)
        {
            return false;
        }
        self.last = Some((now, text.to_string()));
        true
    }
}
