use std::sync::Arc;

use {
    reelay_common::{time::now_secs, types::ChatKind},
    reelay_store::UserSighting,
    teloxide::types::{Chat, Message, User},
    tracing::{debug, info, warn},
};

use crate::{
    error::Result,
    presence::UploadPresence,
    relay::{RelayOutcome, RelayRequest},
    state::BotContext,
};

const PLACEHOLDER_TEXT: &str = "⏳ Looking for the video...";
const GENERIC_FAILURE_TEXT: &str = "❌ Something went wrong. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Help,
}

/// Handle one inbound message: commands, then supported links.
///
/// Returns an error only when the request could not be completed and the
/// placeholder was switched to the generic failure text.
pub async fn handle_message(ctx: &BotContext, msg: &Message) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return match parse_command(text) {
            Some(command) => handle_command(ctx, msg, command).await,
            None => Ok(()),
        };
    }

    let Some(url) = ctx.router.extract_link(text) else {
        return Ok(());
    };

    let kind = chat_kind(&msg.chat);
    if !ctx.config.is_chat_allowed(kind) {
        debug!(chat_id = msg.chat.id.0, %kind, "ignoring link in disallowed chat");
        return Ok(());
    }

    let chat_id = msg.chat.id;
    let requester = requester_label(msg.from.as_ref());
    info!(chat_id = chat_id.0, requester = %requester, url = %url, "link received");

    register_user(ctx, msg.from.as_ref()).await;

    if ctx.config.delete_source_message
        && let Err(e) = ctx.messenger.delete_message(chat_id, msg.id).await
    {
        // Groups where the bot is not an admin.
        debug!(chat_id = chat_id.0, error = %e, "could not delete source message");
    }

    let placeholder = ctx.messenger.send_text(chat_id, PLACEHOLDER_TEXT).await?;
    let _presence = UploadPresence::start(Arc::clone(&ctx.messenger), chat_id);

    let request = RelayRequest {
        chat_id,
        source_url: url,
        placeholder,
        requester,
    };
    match ctx.relay.relay(&request).await {
        Ok(outcome) => {
            match outcome {
                RelayOutcome::Failed(kind) => {
                    info!(chat_id = chat_id.0, ?kind, "request failed");
                },
                other => debug!(chat_id = chat_id.0, outcome = ?other, "request done"),
            }
            Ok(())
        },
        Err(e) => {
            if let Err(edit_err) = ctx
                .messenger
                .edit_text(chat_id, placeholder, GENERIC_FAILURE_TEXT)
                .await
            {
                debug!(error = %edit_err, "failed to report generic failure");
            }
            Err(e)
        },
    }
}

async fn handle_command(ctx: &BotContext, msg: &Message, command: Command) -> Result<()> {
    let chat_id = msg.chat.id;
    match command {
        Command::Start => {
            register_user(ctx, msg.from.as_ref()).await;
            let name = msg
                .from
                .as_ref()
                .map(User::full_name)
                .unwrap_or_else(|| "there".into());
            ctx.messenger.send_text(chat_id, &greeting(&name)).await?;
        },
        Command::Help => {
            ctx.messenger
                .send_text(chat_id, &help_text(ctx.router.domains()))
                .await?;
        },
    }
    Ok(())
}

/// `/start`, `/START@reelay_bot extra` and the like.
fn parse_command(text: &str) -> Option<Command> {
    let token = text.split_whitespace().next()?.strip_prefix('/')?;
    let name = token.split('@').next().unwrap_or(token);
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        _ => None,
    }
}

fn greeting(name: &str) -> String {
    format!("👋 Hi, {name}!\nI download videos from social networks. Just send me a link.")
}

fn help_text(domains: &[String]) -> String {
    format!(
        "Send me a link and I'll reply with the video.\nSupported: {}",
        domains.join(", ")
    )
}

async fn register_user(ctx: &BotContext, user: Option<&User>) {
    let Some(sighting) = user.and_then(user_sighting) else {
        return;
    };
    if let Err(e) = ctx.users.upsert(&sighting, now_secs()).await {
        warn!(user_id = sighting.user_id, error = %e, "failed to register user");
    }
}

fn user_sighting(user: &User) -> Option<UserSighting> {
    Some(UserSighting {
        user_id: i64::try_from(user.id.0).ok()?,
        username: user.username.clone(),
        full_name: user.full_name(),
    })
}

/// `@username`, else the first name, else `ID:<id>`.
pub fn requester_label(user: Option<&User>) -> String {
    let Some(user) = user else {
        return "unknown".into();
    };
    if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
        return format!("@{username}");
    }
    if !user.first_name.trim().is_empty() {
        return user.first_name.clone();
    }
    format!("ID:{}", user.id.0)
}

pub fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_group() {
        ChatKind::Group
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Channel
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            outbound::Messenger,
            testing::{Call, FakeExtractor, FakeMessenger, SentVideo, sqlite_stores},
        },
        async_trait::async_trait,
        reelay_config::ReelayConfig,
        reelay_media::MediaExtractor,
        reelay_store::{CacheEntry, MediaCache, UserRegistry},
        rstest::rstest,
        serde_json::{Value, json},
        std::{sync::atomic::Ordering, time::Duration},
    };

    const LINK: &str = "https://www.youtube.com/shorts/abc123?x=1";

    struct Harness {
        _tmp: tempfile::TempDir,
        ctx: BotContext,
        messenger: Arc<FakeMessenger>,
        extractor: Arc<FakeExtractor>,
        users: Arc<dyn UserRegistry>,
    }

    async fn harness_with(tweak: impl FnOnce(&mut ReelayConfig)) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let (cache, users) = sqlite_stores(tmp.path()).await;
        let mut config = ReelayConfig::default();
        config.download.dir = tmp.path().join("downloads");
        tweak(&mut config);
        let messenger = Arc::new(FakeMessenger::default());
        let extractor = Arc::new(FakeExtractor::new(Duration::from_secs(10)));
        let users: Arc<dyn UserRegistry> = users;
        let ctx = BotContext::new(
            &config,
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            cache,
            Arc::clone(&users),
            Arc::clone(&extractor) as Arc<dyn MediaExtractor>,
        );
        Harness {
            _tmp: tmp,
            ctx,
            messenger,
            extractor,
            users,
        }
    }

    async fn harness() -> Harness {
        harness_with(|_| {}).await
    }

    fn private_chat() -> Value {
        json!({ "id": 42, "type": "private", "first_name": "Alice" })
    }

    fn alice() -> Value {
        json!({
            "id": 1001,
            "is_bot": false,
            "first_name": "Alice",
            "last_name": "Liddell",
            "username": "alice"
        })
    }

    fn message(chat: Value, from: Value, text: &str) -> Message {
        serde_json::from_value(json!({
            "message_id": 5,
            "date": 1,
            "chat": chat,
            "from": from,
            "text": text
        }))
        .expect("deserialize message")
    }

    #[rstest]
    #[case("/start", Some(Command::Start))]
    #[case("/START@reelay_bot", Some(Command::Start))]
    #[case("/help me", Some(Command::Help))]
    #[case("/settings", None)]
    #[case("/", None)]
    #[case("start", None)]
    fn parses_commands(#[case] text: &str, #[case] expected: Option<Command>) {
        assert_eq!(parse_command(text), expected);
    }

    #[rstest]
    #[case(json!({"id": 1, "is_bot": false, "first_name": "Alice", "username": "alice"}), "@alice")]
    #[case(json!({"id": 2, "is_bot": false, "first_name": "Bob"}), "Bob")]
    #[case(json!({"id": 3, "is_bot": false, "first_name": ""}), "ID:3")]
    fn labels_requesters(#[case] user: Value, #[case] expected: &str) {
        let user: User = serde_json::from_value(user).unwrap();
        assert_eq!(requester_label(Some(&user)), expected);
    }

    #[rstest]
    #[case(json!({"id": 1, "type": "private", "first_name": "A"}), ChatKind::Private)]
    #[case(json!({"id": -2, "type": "group", "title": "G"}), ChatKind::Group)]
    #[case(json!({"id": -1003, "type": "supergroup", "title": "S"}), ChatKind::Supergroup)]
    #[case(json!({"id": -1004, "type": "channel", "title": "C"}), ChatKind::Channel)]
    fn maps_chat_kinds(#[case] chat: Value, #[case] expected: ChatKind) {
        let chat: Chat = serde_json::from_value(chat).unwrap();
        assert_eq!(chat_kind(&chat), expected);
    }

    #[tokio::test]
    async fn start_registers_user_and_greets() {
        let h = harness().await;
        let msg = message(private_chat(), alice(), "/start");

        handle_message(&h.ctx, &msg).await.unwrap();

        let user = h.users.get(1001).await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.full_name, "Alice Liddell");
        assert_eq!(h.messenger.calls(), vec![Call::Text {
            chat_id: 42,
            text: greeting("Alice Liddell"),
        }]);
    }

    #[tokio::test]
    async fn help_lists_domains() {
        let h = harness().await;
        handle_message(&h.ctx, &message(private_chat(), alice(), "/help"))
            .await
            .unwrap();

        let calls = h.messenger.calls();
        let Call::Text { text, .. } = &calls[0] else {
            panic!("expected a text reply, got {calls:?}");
        };
        assert!(text.contains("tiktok.com"));
        assert!(text.contains("instagram.com"));
    }

    #[tokio::test]
    async fn link_is_relayed_end_to_end() {
        let h = harness().await;
        let msg = message(private_chat(), alice(), &format!("look {LINK}"));

        handle_message(&h.ctx, &msg).await.unwrap();

        let calls = h.messenger.calls();
        assert_eq!(calls[0], Call::Delete { message_id: 5 });
        assert_eq!(calls[1], Call::Text {
            chat_id: 42,
            text: PLACEHOLDER_TEXT.into(),
        });
        let videos = h.messenger.videos();
        assert_eq!(videos.len(), 1);
        assert!(matches!(videos[0].0, SentVideo::File { existed: true, .. }));
        assert!(videos[0].1.starts_with("👤 @alice\n"));
        // Placeholder (first sent message, ID 100) removed on success.
        assert_eq!(calls.last(), Some(&Call::Delete { message_id: 100 }));
        assert_eq!(h.extractor.calls(), 1);
        assert!(h.users.get(1001).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn source_message_kept_when_deletion_disabled() {
        let h = harness_with(|c| c.telegram.delete_source_message = false).await;

        handle_message(&h.ctx, &message(private_chat(), alice(), LINK))
            .await
            .unwrap();

        assert!(!h.messenger.calls().contains(&Call::Delete { message_id: 5 }));
        assert_eq!(h.messenger.videos().len(), 1);
    }

    #[tokio::test]
    async fn failed_source_deletion_is_not_fatal() {
        let h = harness().await;
        h.messenger.fail_deletes.store(true, Ordering::SeqCst);

        handle_message(&h.ctx, &message(private_chat(), alice(), LINK))
            .await
            .unwrap();

        assert_eq!(h.messenger.videos().len(), 1);
    }

    #[tokio::test]
    async fn channel_posts_are_ignored() {
        let h = harness().await;
        let channel = json!({ "id": -1004, "type": "channel", "title": "News" });
        let msg: Message = serde_json::from_value(json!({
            "message_id": 5,
            "date": 1,
            "chat": channel,
            "text": LINK
        }))
        .unwrap();

        handle_message(&h.ctx, &msg).await.unwrap();

        assert!(h.messenger.calls().is_empty());
        assert_eq!(h.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn unsupported_text_is_ignored() {
        let h = harness().await;
        handle_message(&h.ctx, &message(private_chat(), alice(), "hello https://vimeo.com/1"))
            .await
            .unwrap();
        assert!(h.messenger.calls().is_empty());
        assert!(h.users.get(1001).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn group_links_are_handled() {
        let h = harness().await;
        let group = json!({ "id": -2, "type": "group", "title": "Friends" });
        handle_message(&h.ctx, &message(group, alice(), LINK))
            .await
            .unwrap();
        assert_eq!(h.messenger.videos().len(), 1);
    }

    struct BrokenCache;

    #[async_trait]
    impl MediaCache for BrokenCache {
        async fn get(&self, _url: &str) -> reelay_store::Result<Option<CacheEntry>> {
            Err(reelay_store::Error::Io(std::io::Error::other("database is locked")))
        }

        async fn insert_if_absent(&self, _url: &str, _file_id: &str) -> reelay_store::Result<bool> {
            Ok(true)
        }

        async fn list(&self, _limit: u32) -> reelay_store::Result<Vec<CacheEntry>> {
            Ok(Vec::new())
        }

        async fn remove(&self, _url: &str) -> reelay_store::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn unexpected_error_shows_generic_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, users) = sqlite_stores(tmp.path()).await;
        let messenger = Arc::new(FakeMessenger::default());
        let ctx = BotContext::new(
            &ReelayConfig::default(),
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            Arc::new(BrokenCache),
            users,
            Arc::new(FakeExtractor::new(Duration::from_secs(1))),
        );

        let result = handle_message(&ctx, &message(private_chat(), alice(), LINK)).await;

        assert!(result.is_err());
        assert_eq!(messenger.edits(), vec![GENERIC_FAILURE_TEXT.to_string()]);
        assert!(messenger.videos().is_empty());
    }
}
