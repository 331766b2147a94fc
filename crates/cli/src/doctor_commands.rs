//! `reelay doctor`: config validation and environment audit.
//!
//! Prints a report with `[ok]`, `[warn]`, `[fail]`, `[skip]` or `[info]` per
//! item and exits with status 1 when anything failed.

use std::path::Path;

use {
    anyhow::Result,
    reelay_config::{ReelayConfig, Severity, ValidationResult},
    reelay_media::YtDlpExtractor,
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Skip => DIM,
            Self::Info => CYAN,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

/// Print every section and return `(errors, warnings)`.
fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

pub async fn handle_doctor(config: &ReelayConfig, explicit_path: Option<&Path>) -> Result<()> {
    eprintln!("{BOLD}reelay doctor{RESET}");
    eprintln!("{BOLD}============={RESET}\n");

    let config_file = explicit_path
        .map(Path::to_path_buf)
        .or_else(reelay_config::find_config_file);
    let label = config_file
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults + environment".into());

    let sections = vec![
        check_config(&label, &reelay_config::validate(config)),
        check_telegram(config),
        check_tools(config).await,
        check_directories(config),
        check_database(&config.database.path).await,
    ];

    let (errors, warnings) = print_report(&sections);

    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn check_config(label: &str, result: &ValidationResult) -> Section {
    let mut section = Section::new(format!("Config ({label})"));

    if result.diagnostics.is_empty() {
        section.push(Status::Ok, "No problems found");
    }
    for d in &result.diagnostics {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
        };
        section.push(status, format!("{}: {}", d.path, d.message));
    }

    section
}

fn check_telegram(config: &ReelayConfig) -> Section {
    let mut section = Section::new("Telegram");
    let telegram = &config.telegram;

    match telegram.api_url.as_deref() {
        Some(url) => section.push(Status::Info, format!("Local Bot API server: {url}")),
        None => section.push(Status::Info, "Public Bot API (50 MB upload limit)"),
    }

    match telegram.shared_dir.as_deref() {
        Some(dir) if dir.is_dir() => {
            section.push(Status::Ok, format!("Shared dir: {}", dir.display()));
            check_writable(&mut section, dir, "Shared dir");
        },
        Some(dir) => section.push(
            Status::Fail,
            format!("Shared dir does not exist: {}", dir.display()),
        ),
        None => section.push(Status::Skip, "No shared dir, files are uploaded"),
    }

    let kinds: Vec<String> = telegram
        .allowed_chats
        .iter()
        .map(ToString::to_string)
        .collect();
    section.push(
        Status::Info,
        format!("Links accepted in: {}", kinds.join(", ")),
    );

    section
}

async fn check_tools(config: &ReelayConfig) -> Section {
    let mut section = Section::new("Tools");

    let extractor = YtDlpExtractor::from_config(&config.download);
    match extractor.version().await {
        Some(version) => section.push(
            Status::Ok,
            format!("yt-dlp {version} ({})", extractor.binary().display()),
        ),
        None => section.push(
            Status::Fail,
            format!(
                "yt-dlp not runnable at {} (install it or set download.ytdlp_path)",
                extractor.binary().display()
            ),
        ),
    }

    match which::which("ffmpeg") {
        Ok(path) => section.push(Status::Ok, format!("ffmpeg ({})", path.display())),
        Err(_) => section.push(
            Status::Warn,
            "ffmpeg not found, separate video and audio streams cannot be merged",
        ),
    }

    for (domain, file) in &config.download.cookies {
        if file.is_file() {
            section.push(Status::Ok, format!("Cookies for {domain}: {}", file.display()));
        } else {
            section.push(
                Status::Warn,
                format!("Cookies for {domain} missing: {}", file.display()),
            );
        }
    }

    section
}

fn check_directories(config: &ReelayConfig) -> Section {
    let mut section = Section::new("Directories");
    let dir = &config.download.dir;

    match std::fs::create_dir_all(dir) {
        Ok(()) => {
            section.push(Status::Ok, format!("Download dir: {}", dir.display()));
            check_writable(&mut section, dir, "Download dir");
        },
        Err(e) => section.push(
            Status::Fail,
            format!("Cannot create download dir {}: {e}", dir.display()),
        ),
    }

    section
}

fn check_writable(section: &mut Section, dir: &Path, label: &str) {
    let marker = dir.join(".reelay-doctor-write-check");
    match std::fs::write(&marker, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
        },
        Err(e) => section.push(Status::Fail, format!("{label} is not writable: {e}")),
    }
}

async fn check_database(db_path: &Path) -> Section {
    let mut section = Section::new(format!("Database ({})", db_path.display()));

    if !db_path.exists() {
        section.push(
            Status::Skip,
            "not created yet (run `reelay db migrate` or start the bot)",
        );
        return section;
    }

    let db_url = format!("sqlite:{}?mode=ro", db_path.display());
    match sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await
    {
        Ok(pool) => {
            match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM video_cache")
                .fetch_one(&pool)
                .await
            {
                Ok(count) => section.push(Status::Ok, format!("{count} cached video(s)")),
                Err(e) => section.push(Status::Fail, format!("Database query failed: {e}")),
            }
            pool.close().await;
        },
        Err(e) => section.push(Status::Fail, format!("Cannot open database: {e}")),
    }

    section
}
