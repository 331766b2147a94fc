//! Telegram front end for reelay.
//!
//! Receives links through manual `getUpdates` polling, relays the video via
//! [`relay::RelayService`] and keeps the chat informed through the
//! [`outbound::Messenger`] seam.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod presence;
pub mod relay;
pub mod router;
pub mod state;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testing;

pub use {
    bot::{build_bot, start_polling},
    error::{Error, Result},
    outbound::{Messenger, TelegramOutbound, VideoSource},
    relay::{RelayOutcome, RelayRequest, RelayService, RelaySettings},
    router::LinkRouter,
    state::BotContext,
};
