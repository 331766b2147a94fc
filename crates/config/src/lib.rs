//! Configuration loading, env substitution, env overrides and validation.
//!
//! Config files: `reelay.toml`, `reelay.yaml`, `reelay.yml` or `reelay.json`,
//! searched in `./` then the user config directory (`~/.config/reelay/`).
//!
//! String values support `${ENV_VAR}` and `${ENV_VAR:-default}` substitution.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{DatabaseConfig, DownloadConfig, ReelayConfig, RouterConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
