//! [`MediaExtractor`] backed by the `yt-dlp` command line tool.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    async_trait::async_trait,
    reelay_config::DownloadConfig,
    serde::Deserialize,
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        process::Command,
        sync::mpsc,
    },
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    extractor::{DownloadedMedia, ExtractRequest, MediaExtractor, MediaInfo},
    progress::{DownloadProgress, parse_progress_line},
};

const DEFAULT_BINARY: &str = "yt-dlp";

/// Lines kept from stderr for error reporting.
const STDERR_TAIL: usize = 20;

/// Lowercased stderr fragments meaning the source wants a logged-in or
/// age-verified session.
const AUTH_MARKERS: &[&str] = &[
    "sign in to confirm",
    "confirm your age",
    "age-restricted",
    "age restricted",
    "inappropriate for some users",
    "login required",
    "log in to",
    "login to",
    "requires authentication",
    "use --cookies",
    "--cookies-from-browser",
    "private video",
    "this video is private",
];

/// Subset of `yt-dlp -J` output we rely on.
#[derive(Debug, Deserialize)]
struct InfoJson {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    ext: Option<String>,
}

impl From<InfoJson> for MediaInfo {
    fn from(p: InfoJson) -> Self {
        Self {
            id: p.id,
            title: p.title,
            duration: p
                .duration
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            ext: p.ext,
        }
    }
}

/// Runs `yt-dlp` twice per request: a metadata lookup (`-J`) used for the
/// duration check, then the actual download into the request directory.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
    config: DownloadConfig,
}

impl YtDlpExtractor {
    /// Binary from `ytdlp_path`, else the first `yt-dlp` on `PATH`.
    pub fn from_config(config: &DownloadConfig) -> Self {
        let binary = config
            .ytdlp_path
            .clone()
            .or_else(|| which::which(DEFAULT_BINARY).ok())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY));
        Self {
            binary,
            config: config.clone(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// `yt-dlp --version`, if the binary runs.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--no-playlist", "--no-warnings", "--no-colors"]);
        if let Some(proxy) = &self.config.proxy {
            cmd.arg("--proxy").arg(proxy);
        }
        match self.config.cookie_file_for(url) {
            Some(cookies) if cookies.is_file() => {
                cmd.arg("--cookies").arg(cookies);
            },
            Some(cookies) => {
                debug!(path = %cookies.display(), "cookie file missing, downloading without it");
            },
            None => {},
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> Error {
        Error::Spawn {
            binary: self.binary.display().to_string(),
            source,
        }
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        let output = self
            .command(url)
            .arg("-J")
            .arg("--")
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let info: InfoJson = serde_json::from_slice(&output.stdout)?;
        Ok(info.into())
    }

    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        info: &MediaInfo,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<PathBuf> {
        let template = output_dir.join("%(id)s.%(ext)s");
        let mut child = self
            .command(url)
            .arg("-f")
            .arg(&self.config.format)
            .arg("--merge-output-format")
            .arg(&self.config.merge_output_format)
            .arg("-o")
            .arg(&template)
            .args(["--newline", "--progress", "--print", "after_move:filepath"])
            .arg("--")
            .arg(url)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::failed("yt-dlp stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::failed("yt-dlp stderr not captured"))?;
        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();

        let mut output = DownloadOutput::new(output_dir, progress);
        let (mut stdout_done, mut stderr_done) = (false, false);
        while !(stdout_done && stderr_done) {
            tokio::select! {
                line = stdout.next_line(), if !stdout_done => match line? {
                    Some(line) => output.on_stdout(&line),
                    None => stdout_done = true,
                },
                line = stderr.next_line(), if !stderr_done => match line? {
                    Some(line) => output.on_stderr(&line),
                    None => stderr_done = true,
                },
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            debug!(?status, "yt-dlp exited with failure");
            return Err(classify_failure(&output.error_text()));
        }

        match output.printed_path().await {
            Some(path) => Ok(path),
            None => locate_output(output_dir, &info.id)
                .await?
                .ok_or_else(|| Error::failed("yt-dlp finished but no output file was found")),
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(&self, request: ExtractRequest<'_>) -> Result<DownloadedMedia> {
        let info = self.fetch_info(request.url).await?;
        debug!(id = %info.id, duration = ?info.duration, "fetched video info");

        if let (Some(limit), Some(duration)) = (request.max_duration, info.duration)
            && duration > limit
        {
            info!(url = %request.url, ?duration, ?limit, "video exceeds duration limit");
            return Err(Error::DurationLimit { duration, limit });
        }

        tokio::fs::create_dir_all(request.output_dir).await?;
        let path = self
            .download(request.url, request.output_dir, &info, request.progress)
            .await?;

        info!(url = %request.url, path = %path.display(), "video downloaded");
        Ok(DownloadedMedia { path, info })
    }
}

/// Accumulates what a running download writes to stdout and stderr.
struct DownloadOutput<'a> {
    output_dir: &'a Path,
    progress: Option<mpsc::Sender<DownloadProgress>>,
    printed: Vec<PathBuf>,
    errors: Vec<String>,
    stderr_tail: Vec<String>,
}

impl<'a> DownloadOutput<'a> {
    fn new(output_dir: &'a Path, progress: Option<mpsc::Sender<DownloadProgress>>) -> Self {
        Self {
            output_dir,
            progress,
            printed: Vec::new(),
            errors: Vec::new(),
            stderr_tail: Vec::new(),
        }
    }

    fn on_stdout(&mut self, line: &str) {
        if self.report_progress(line) {
            return;
        }
        let line = line.trim();
        if line.starts_with("ERROR:") {
            self.errors.push(line.to_string());
            return;
        }
        let path = Path::new(line);
        if path.starts_with(self.output_dir) {
            self.printed.push(path.to_path_buf());
        }
    }

    fn on_stderr(&mut self, line: &str) {
        if self.report_progress(line) {
            return;
        }
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("ERROR:") {
            self.errors.push(line.to_string());
        }
        if self.stderr_tail.len() == STDERR_TAIL {
            self.stderr_tail.remove(0);
        }
        self.stderr_tail.push(line.to_string());
    }

    fn report_progress(&self, line: &str) -> bool {
        let Some(update) = parse_progress_line(line) else {
            return false;
        };
        if let Some(tx) = &self.progress {
            // A slow consumer only loses intermediate updates.
            let _ = tx.try_send(update);
        }
        true
    }

    fn error_text(&self) -> String {
        if self.errors.is_empty() {
            self.stderr_tail.join("\n")
        } else {
            self.errors.join("\n")
        }
    }

    /// Last printed final path that exists on disk.
    async fn printed_path(&self) -> Option<PathBuf> {
        for path in self.printed.iter().rev() {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Some(path.clone());
            }
        }
        None
    }
}

/// Find `<id>.<ext>` in `dir`, skipping partial and temporary files.
async fn locate_output(dir: &Path, id: &str) -> Result<Option<PathBuf>> {
    let prefix = format!("{id}.");
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(&prefix) || is_partial(name) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        found = Some(entry.path());
        if name.ends_with(".mp4") {
            break;
        }
    }
    Ok(found)
}

fn is_partial(name: &str) -> bool {
    [".part", ".ytdl", ".temp"]
        .iter()
        .any(|suffix| name.ends_with(suffix))
        || name.contains(".part-")
}

/// Map yt-dlp error output to an [`Error`].
pub fn classify_failure(stderr: &str) -> Error {
    let message = stderr.trim();
    let lower = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lower.contains(marker)) {
        warn!(error = %message, "source requires authentication");
        return Error::AuthRequired {
            message: message.to_string(),
        };
    }
    if message.is_empty() {
        return Error::failed("yt-dlp exited without an error message");
    }
    Error::failed(message)
}
