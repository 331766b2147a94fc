use std::{future::Future, path::Path, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        payloads::SendVideoSetters,
        prelude::*,
        types::{ChatAction, ChatId, InputFile, MessageId},
    },
    tracing::{debug, info, warn},
    url::Url,
};

use crate::error::Result;

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Where the video for a `sendVideo` call comes from.
#[derive(Debug, Clone, Copy)]
pub enum VideoSource<'a> {
    /// Durable `file_id` from an earlier send.
    Reference(&'a str),
    /// Local file, uploaded with the request.
    File(&'a Path),
    /// `file://` URI readable by a local Bot API server.
    LocalUri(&'a Url),
}

/// Chat operations used by the relay flow.
///
/// Every mutation returns its error; callers decide whether it matters.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId>;

    /// Replace a message's text. Editing to identical text is not an error.
    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    /// Send a video. Returns the durable reference Telegram assigned to it,
    /// if the response carried one.
    async fn send_video(
        &self,
        chat_id: ChatId,
        video: VideoSource<'_>,
        caption: &str,
    ) -> Result<Option<String>>;

    /// Show "sending video..." in the chat header for a few seconds.
    async fn send_upload_action(&self, chat_id: ChatId) -> Result<()>;
}

/// [`Messenger`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_telegram_request_with_retry<T, F, Fut>(
        &self,
        chat_id: ChatId,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = chat_id.0,
                            operation,
                            retries,
                            max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn is_message_not_modified_error(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

/// Durable reference of whatever media the sent message ended up carrying.
/// Telegram may file a silent clip as an animation or a document.
fn sent_file_id(message: &Message) -> Option<String> {
    if let Some(video) = message.video() {
        return Some(video.file.id.to_string());
    }
    if let Some(animation) = message.animation() {
        return Some(animation.file.id.to_string());
    }
    message.document().map(|doc| doc.file.id.to_string())
}

#[async_trait]
impl Messenger for TelegramOutbound {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        let message = self
            .run_telegram_request_with_retry(chat_id, "send message", || {
                let req = self.bot.send_message(chat_id, text);
                async move { req.await }
            })
            .await?;
        debug!(
            chat_id = chat_id.0,
            message_id = message.id.0,
            "telegram text sent"
        );
        Ok(message.id)
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        match self
            .run_telegram_request_with_retry(chat_id, "edit message", || {
                let req = self.bot.edit_message_text(chat_id, message_id, text);
                async move { req.await }
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified_error(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.run_telegram_request_with_retry(chat_id, "delete message", || {
            let req = self.bot.delete_message(chat_id, message_id);
            async move { req.await }
        })
        .await?;
        Ok(())
    }

    async fn send_video(
        &self,
        chat_id: ChatId,
        video: VideoSource<'_>,
        caption: &str,
    ) -> Result<Option<String>> {
        let (input, kind) = match video {
            VideoSource::Reference(file_id) => {
                (InputFile::file_id(file_id.to_owned()), "reference")
            },
            VideoSource::File(path) => (InputFile::file(path.to_path_buf()), "upload"),
            VideoSource::LocalUri(uri) => (InputFile::url(uri.clone()), "local"),
        };

        let message = self
            .bot
            .send_video(chat_id, input)
            .caption(caption)
            .supports_streaming(true)
            .await?;

        let file_id = sent_file_id(&message);
        info!(
            chat_id = chat_id.0,
            message_id = message.id.0,
            source = kind,
            has_reference = file_id.is_some(),
            "telegram video sent"
        );
        Ok(file_id)
    }

    async fn send_upload_action(&self, chat_id: ChatId) -> Result<()> {
        self.bot
            .send_chat_action(chat_id, ChatAction::UploadVideo)
            .await?;
        Ok(())
    }
}
