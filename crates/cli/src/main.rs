mod cache_commands;
mod db_commands;
mod doctor_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, bail},
    clap::{Parser, Subcommand},
    reelay_config::{ReelayConfig, Severity},
    reelay_media::YtDlpExtractor,
    reelay_store::{SqliteMediaCache, SqliteUserRegistry},
    reelay_telegram::{BotContext, Messenger, TelegramOutbound},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "reelay",
    about = "Telegram bot that relays short videos from links",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./reelay.toml and ~/.config/reelay/).
    #[arg(long, global = true, env = "REELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default when no subcommand is provided).
    Run,
    /// Database management (migrate, reset).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Inspect or edit the video cache.
    Cache {
        #[command(subcommand)]
        action: cache_commands::CacheAction,
    },
    /// Inspect registered users.
    Users {
        #[command(subcommand)]
        action: cache_commands::UsersAction,
    },
    /// Check configuration, yt-dlp and the database.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// `--config` if given, else discovery. Env overrides apply either way.
fn load_config(cli: &Cli) -> anyhow::Result<ReelayConfig> {
    match &cli.config {
        Some(path) => {
            let mut config = reelay_config::load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            reelay_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(reelay_config::discover_and_load()),
    }
}

async fn run_bot(config: ReelayConfig) -> anyhow::Result<()> {
    let validation = reelay_config::validate(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
        }
    }
    if validation.has_errors() {
        bail!("invalid configuration, run `reelay doctor` for details");
    }

    let pool = reelay_store::connect(&config.database.path).await?;
    reelay_store::run_migrations(&pool).await?;
    info!(path = %config.database.path.display(), "database ready");

    let extractor = YtDlpExtractor::from_config(&config.download);
    match extractor.version().await {
        Some(version) => info!(
            binary = %extractor.binary().display(),
            version = %version,
            "yt-dlp found"
        ),
        None => warn!(
            binary = %extractor.binary().display(),
            "yt-dlp did not run, downloads will fail"
        ),
    }

    let bot = reelay_telegram::build_bot(&config.telegram)?;
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramOutbound::new(bot.clone()));
    let ctx = Arc::new(BotContext::new(
        &config,
        messenger,
        Arc::new(SqliteMediaCache::new(pool.clone())),
        Arc::new(SqliteUserRegistry::new(pool.clone())),
        Arc::new(extractor),
    ));

    let cancel = reelay_telegram::start_polling(bot, ctx).await?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown requested");
            cancel.cancel();
        },
        () = cancel.cancelled() => {
            warn!("telegram polling stopped");
        },
    }

    pool.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "reelay starting");

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => run_bot(config).await,
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
        Some(Commands::Cache { action }) => cache_commands::handle_cache(action, &config).await,
        Some(Commands::Users { action }) => cache_commands::handle_users(action, &config).await,
        Some(Commands::Doctor) => {
            doctor_commands::handle_doctor(&config, cli.config.as_deref()).await
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["reelay"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "reelay",
            "cache",
            "list",
            "--limit",
            "5",
            "--json-logs",
            "--config",
            "/etc/reelay.toml",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/etc/reelay.toml"))
        );
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                action: cache_commands::CacheAction::List { limit: 5 }
            })
        ));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelay.toml");
        std::fs::write(&path, "[download]\nmax_duration_secs = 180\n").unwrap();

        let cli = Cli::try_parse_from(["reelay", "--config", path.to_str().unwrap()]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.download.max_duration_secs, 180);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["reelay", "--config", "/nonexistent/reelay.toml"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
