use std::{sync::Arc, time::Duration};

use {
    reelay_config::TelegramConfig,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        payloads::DeleteWebhookSetters,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
    url::Url,
};

use crate::{
    error::{Error, Result},
    handlers,
    state::BotContext,
};

/// Long-polling timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Back-off after a failed `getUpdates`.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build the bot client, pointed at a local Bot API server when configured.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    // Client timeout must outlast the long-polling timeout so the request
    // isn't aborted before Telegram responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(45))
        .build()
        .map_err(|e| Error::message(format!("failed to build telegram http client: {e}")))?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    match config.api_url.as_deref() {
        Some(api_url) => {
            let url = Url::parse(api_url)
                .map_err(|e| Error::message(format!("invalid telegram api_url {api_url}: {e}")))?;
            info!(api_url = %url, "using custom telegram bot api server");
            Ok(bot.set_api_url(url))
        },
        None => Ok(bot),
    }
}

/// Verify the token, clear any webhook and register the command list.
///
/// Updates that piled up while the bot was offline are dropped so a restart
/// doesn't replay a backlog of stale links.
async fn connect(bot: &Bot) -> Result<()> {
    let me = bot.get_me().await?;

    // Long polling doesn't work while a webhook is set.
    bot.delete_webhook().drop_pending_updates(true).await?;

    let commands = vec![
        BotCommand::new("start", "About this bot"),
        BotCommand::new("help", "Supported sites"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");
    Ok(())
}

/// Connect and start polling.
///
/// Spawns a background task that processes updates until the returned
/// `CancellationToken` is cancelled. Each message is handled on its own task.
pub async fn start_polling(bot: Bot, ctx: Arc<BotContext>) -> Result<CancellationToken> {
    connect(&bot).await?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                () = cancel_clone.cancelled() => {
                    info!("telegram polling stopped");
                    break;
                },
                result = bot
                    .get_updates()
                    .offset(offset)
                    .timeout(POLL_TIMEOUT_SECS)
                    .allowed_updates(vec![AllowedUpdate::Message])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                debug!(
                                    chat_id = msg.chat.id.0,
                                    message_id = msg.id.0,
                                    "received telegram message"
                                );
                                let ctx = Arc::clone(&ctx);
                                tokio::spawn(async move {
                                    if let Err(e) = handlers::handle_message(&ctx, &msg).await {
                                        error!(
                                            chat_id = msg.chat.id.0,
                                            error = %e,
                                            "error handling telegram message"
                                        );
                                    }
                                });
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    if is_conflict(&e) {
                        warn!(
                            "telegram polling disabled: another instance is already running with this token"
                        );
                        cancel_clone.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel_clone.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                    }
                },
            }
        }
    });

    Ok(cancel)
}

/// Another process is polling with the same token.
fn is_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
