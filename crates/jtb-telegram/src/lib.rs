//! Telegram adapter (teloxide).
//!
//! This crate implements the `jtb-core` transport and messaging ports over the
//! Telegram Bot API, and ships the bot's default handler set.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{AllowedUpdate, ParseMode},
    utils::command::BotCommands,
    RequestError,
};

use tracing::{info, warn};

pub mod convert;
pub mod handlers;
pub mod retry;

use jtb_core::{
    config::BotConfig,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    lifecycle::BotClient,
    polling::PollSettings,
    ports::{MessagingPort, UpdateTransport},
    update::Update,
    Result,
};

use retry::{with_retry, RetryPolicy};

/// HTTP client timeouts derived from [`PollSettings`].
///
/// reqwest 0.11 has no timeout for checking a connection out of its pool, so
/// `pool_timeout` is applied as the idle lifetime of pooled connections.
/// Read and write phases have no separate knobs either; they are folded into
/// the whole-request timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
    pub pool_idle: Duration,
}

impl From<&PollSettings> for HttpTimeouts {
    fn from(s: &PollSettings) -> Self {
        Self {
            request: s.request_timeout(),
            connect: s.connect_timeout,
            pool_idle: s.pool_timeout,
        }
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
    username: Option<String>,
    poll_retry: RetryPolicy,
    send_retry: RetryPolicy,
}

impl TelegramClient {
    pub fn new(bot: Bot, username: Option<String>) -> Self {
        Self {
            bot,
            username,
            poll_retry: RetryPolicy::POLL,
            send_retry: RetryPolicy::SEND,
        }
    }

    pub fn with_poll_retry(mut self, policy: RetryPolicy) -> Self {
        self.poll_retry = policy;
        self
    }

    /// Build the HTTP client with the poll timeouts, then check the token with
    /// `getMe`. Any failure here aborts startup.
    pub async fn connect(cfg: Arc<BotConfig>, settings: PollSettings) -> Result<Self> {
        validate_token(&cfg.token)?;

        let timeouts = HttpTimeouts::from(&settings);
        let http = teloxide::net::default_reqwest_settings()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .pool_idle_timeout(timeouts.pool_idle)
            .build()
            .map_err(|e| Error::Setup(format!("failed to build http client: {e}")))?;
        let bot = Bot::with_client(cfg.token.clone(), http);

        let me = bot
            .get_me()
            .await
            .map_err(|e| Error::Setup(format!("getMe failed: {e}")))?;
        let username = me.user.username.clone();
        info!(
            username = username.as_deref().unwrap_or("<none>"),
            "connected to Telegram"
        );

        // Best-effort: the command menu is cosmetic.
        if let Err(e) = bot
            .set_my_commands(handlers::commands::Command::bot_commands())
            .await
        {
            warn!(error = %e, "failed to publish command list");
        }

        Ok(Self::new(bot, username))
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

/// Telegram tokens look like `123456:ABC-def...`.
pub fn validate_token(token: &str) -> Result<()> {
    let valid = match token.split_once(':') {
        Some((id, secret)) => {
            !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.trim().is_empty()
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Setup(
            "bot token is malformed (expected <bot id>:<secret>)".to_string(),
        ))
    }
}

#[async_trait]
impl UpdateTransport for TelegramClient {
    async fn drop_pending_updates(&self) -> Result<()> {
        with_retry(self.poll_retry, || {
            self.bot.delete_webhook().drop_pending_updates(true)
        })
        .await
        .map_err(|e| Error::Transport(format!("deleteWebhook failed: {e}")))?;
        Ok(())
    }

    async fn get_updates(&self, offset: Option<i32>, timeout: Duration) -> Result<Vec<Update>> {
        let timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        let updates = with_retry(self.poll_retry, || {
            let mut req = self
                .bot
                .get_updates()
                .timeout(timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::EditedMessage]);
            if let Some(o) = offset {
                req = req.offset(o);
            }
            req
        })
        .await
        .map_err(|e| Error::Transport(format!("getUpdates failed: {e}")))?;

        Ok(updates.into_iter().map(convert::update).collect())
    }

    /// Confirm everything below `offset` with one zero-timeout `getUpdates`.
    async fn close(&self, offset: Option<i32>) -> Result<()> {
        let Some(offset) = offset else {
            return Ok(());
        };
        self.bot
            .get_updates()
            .offset(offset)
            .timeout(0)
            .limit(1)
            .await
            .map_err(|e| Error::Transport(format!("failed to acknowledge offset: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = with_retry(self.send_retry, || {
            self.bot.send_message(Self::tg_chat(chat_id), text.to_string())
        })
        .await
        .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = with_retry(self.send_retry, || {
            self.bot
                .send_message(Self::tg_chat(chat_id), html.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await
        .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}

impl BotClient for TelegramClient {
    fn bot_username(&self) -> Option<String> {
        self.username.clone()
    }
}
