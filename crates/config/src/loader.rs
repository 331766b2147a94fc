use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::ReelayConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["reelay.toml", "reelay.yaml", "reelay.yml", "reelay.json"];

/// Environment variables that override file values, in priority order per field.
const TOKEN_VARS: &[&str] = &["REELAY_BOT_TOKEN", "BOT_TOKEN"];
const PROXY_VARS: &[&str] = &["REELAY_PROXY_URL", "PROXY_URL"];
const API_URL_VARS: &[&str] = &["REELAY_TELEGRAM_API_URL"];
const DATABASE_VARS: &[&str] = &["REELAY_DATABASE_PATH"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ReelayConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./reelay.{toml,yaml,yml,json}`
/// 2. `~/.config/reelay/reelay.{toml,yaml,yml,json}`
///
/// Falls back to [`ReelayConfig::default`] when nothing is found or the file
/// does not parse.
pub fn discover_and_load() -> ReelayConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                ReelayConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            ReelayConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .ok()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// User-global config directory (`~/.config/reelay/` on Linux).
pub fn config_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "reelay")
        .map(|d| d.config_dir().to_path_buf())
        .context("could not determine a home directory")
}

/// Overlay process environment variables onto `config`.
pub fn apply_env_overrides(config: &mut ReelayConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut ReelayConfig, lookup: impl Fn(&str) -> Option<String>) {
    let first = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
    };

    if let Some(token) = first(TOKEN_VARS) {
        config.telegram.token = Secret::new(token);
    }
    if let Some(proxy) = first(PROXY_VARS) {
        config.download.proxy = Some(proxy);
    }
    if let Some(api_url) = first(API_URL_VARS) {
        config.telegram.api_url = Some(api_url);
    }
    if let Some(path) = first(DATABASE_VARS) {
        config.database.path = PathBuf::from(path);
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<ReelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, secrecy::ExposeSecret};

    #[rstest]
    #[case("reelay.toml", "[download]\nmax_duration_secs = 42\n")]
    #[case("reelay.yaml", "download:\n  max_duration_secs: 42\n")]
    #[case("reelay.json", r#"{"download": {"max_duration_secs": 42}}"#)]
    fn loads_every_supported_format(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.download.max_duration_secs, 42);
        assert_eq!(cfg.download.merge_output_format, "mp4");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelay.ini");
        std::fs::write(&path, "x=1").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/reelay.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/reelay.toml"));
    }

    #[test]
    fn env_overrides_take_priority_in_order() {
        let mut cfg = ReelayConfig::default();
        cfg.download.proxy = Some("http://file-proxy:3128".into());

        apply_env_overrides_with(&mut cfg, |name| match name {
            "BOT_TOKEN" => Some("legacy".into()),
            "REELAY_BOT_TOKEN" => Some("preferred".into()),
            "PROXY_URL" => Some("socks5://env:1080".into()),
            "REELAY_DATABASE_PATH" => Some("/data/bot.db".into()),
            _ => None,
        });

        assert_eq!(cfg.telegram.token.expose_secret(), "preferred");
        assert_eq!(cfg.download.proxy.as_deref(), Some("socks5://env:1080"));
        assert_eq!(cfg.database.path, PathBuf::from("/data/bot.db"));
        assert_eq!(cfg.telegram.api_url, None);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = ReelayConfig::default();
        cfg.telegram.api_url = Some("http://telegram-bot-api:8081".into());

        apply_env_overrides_with(&mut cfg, |name| match name {
            "REELAY_TELEGRAM_API_URL" => Some("   ".into()),
            _ => None,
        });

        assert_eq!(
            cfg.telegram.api_url.as_deref(),
            Some("http://telegram-bot-api:8081")
        );
    }
}
