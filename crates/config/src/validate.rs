//! Semantic checks on a loaded configuration.
//!
//! Parsing already rejects malformed files; this catches settings that parse
//! fine but would make the bot useless or fail at runtime.

use std::path::Path;

use {reelay_common::types::ChatKind, secrecy::ExposeSecret};

use crate::schema::ReelayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. `download.proxy`.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate `config`, checking referenced files on the local filesystem.
#[must_use]
pub fn validate(config: &ReelayConfig) -> ValidationResult {
    validate_with(config, Path::exists)
}

fn validate_with(config: &ReelayConfig, exists: impl Fn(&Path) -> bool) -> ValidationResult {
    let mut result = ValidationResult::default();

    let token = config.telegram.token.expose_secret();
    if token.trim().is_empty() {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token is empty (set it in the config file or BOT_TOKEN)",
        );
    } else if token.contains("${") {
        result.push(
            Severity::Error,
            "telegram.token",
            "token still contains an unresolved ${...} placeholder",
        );
    }

    if config.telegram.allowed_chats.is_empty() {
        result.push(
            Severity::Warning,
            "telegram.allowed_chats",
            "no chat kinds allowed, the bot will ignore every link",
        );
    }
    if config.telegram.allowed_chats.contains(&ChatKind::Channel) {
        result.push(
            Severity::Warning,
            "telegram.allowed_chats",
            "channel posts have no sender, requests will be labelled \"unknown\"",
        );
    }
    if config.telegram.shared_dir.is_some() && config.telegram.api_url.is_none() {
        result.push(
            Severity::Error,
            "telegram.shared_dir",
            "shared_dir only works with a local Bot API server (telegram.api_url)",
        );
    }

    if config
        .router
        .domains
        .iter()
        .all(|d| d.trim().is_empty())
    {
        result.push(
            Severity::Error,
            "router.domains",
            "no supported domains configured",
        );
    }

    if let Some(ref proxy) = config.download.proxy
        && !proxy.contains("://")
    {
        result.push(
            Severity::Error,
            "download.proxy",
            format!("proxy \"{proxy}\" has no scheme (expected e.g. socks5://host:port)"),
        );
    }

    for (domain, path) in &config.download.cookies {
        if !exists(path) {
            result.push(
                Severity::Warning,
                format!("download.cookies.{domain}"),
                format!("cookie file {} does not exist", path.display()),
            );
        }
    }

    if let Some(ref binary) = config.download.ytdlp_path
        && !exists(binary)
    {
        result.push(
            Severity::Error,
            "download.ytdlp_path",
            format!("{} does not exist", binary.display()),
        );
    }

    result
}
