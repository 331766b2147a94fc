//! "Sending video..." indicator kept alive while a request runs.

use std::{sync::Arc, time::Duration};

use {
    teloxide::types::ChatId,
    tokio_util::sync::{CancellationToken, DropGuard},
    tracing::debug,
};

use crate::outbound::Messenger;

/// Telegram clears a chat action after about five seconds.
pub const PRESENCE_REFRESH: Duration = Duration::from_secs(4);

/// Re-sends the upload action until dropped.
pub struct UploadPresence {
    _guard: DropGuard,
}

impl UploadPresence {
    pub fn start(messenger: Arc<dyn Messenger>, chat_id: ChatId) -> Self {
        Self::with_interval(messenger, chat_id, PRESENCE_REFRESH)
    }

    pub fn with_interval(
        messenger: Arc<dyn Messenger>,
        chat_id: ChatId,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = messenger.send_upload_action(chat_id).await {
                    debug!(chat_id = chat_id.0, error = %e, "failed to send upload action");
                }
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {},
                }
            }
        });
        Self {
            _guard: cancel.drop_guard(),
        }
    }
}
