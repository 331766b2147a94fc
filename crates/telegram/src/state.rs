use std::sync::Arc;

use {
    reelay_config::{ReelayConfig, TelegramConfig},
    reelay_media::MediaExtractor,
    reelay_store::{MediaCache, UserRegistry},
};

use crate::{
    outbound::Messenger,
    relay::{RelayService, RelaySettings},
    router::LinkRouter,
};

/// Everything a message handler needs, shared across handler tasks.
pub struct BotContext {
    pub messenger: Arc<dyn Messenger>,
    pub relay: RelayService,
    pub users: Arc<dyn UserRegistry>,
    pub router: LinkRouter,
    pub config: TelegramConfig,
}

impl BotContext {
    pub fn new(
        config: &ReelayConfig,
        messenger: Arc<dyn Messenger>,
        cache: Arc<dyn MediaCache>,
        users: Arc<dyn UserRegistry>,
        extractor: Arc<dyn MediaExtractor>,
    ) -> Self {
        let relay = RelayService::new(
            Arc::clone(&messenger),
            cache,
            extractor,
            RelaySettings::from_config(config),
        );
        Self {
            messenger,
            relay,
            users,
            router: LinkRouter::from_config(&config.router),
            config: config.telegram.clone(),
        }
    }
}
