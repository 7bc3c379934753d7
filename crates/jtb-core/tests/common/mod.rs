#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use jtb_core::{
    config::{BotConfig, BOT_IDENTIFIER},
    domain::{ChatId, MessageId, MessageRef},
    lifecycle::BotClient,
    polling::PollSettings,
    ports::{MessagingPort, UpdateTransport},
    update::{Message, Update, UpdateKind},
    Error, Result,
};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Inner {
    backlog: Mutex<Vec<Update>>,
    live: Mutex<Vec<Update>>,
    polls: Mutex<usize>,
    drops: Mutex<usize>,
    fail_on_poll: Mutex<Option<usize>>,
    closed_with: Mutex<Option<Option<i32>>>,
    sent: Mutex<Vec<(ChatId, String)>>,
    stop_when_idle: Mutex<Option<CancellationToken>>,
}

/// In-memory transport + messenger. Clones share state so tests can inspect
/// what the lifecycle did with the copy it owns.
#[derive(Clone, Default)]
pub struct MockClient {
    inner: Arc<Inner>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates queued before the session starts.
    pub fn seed_backlog(&self, updates: Vec<Update>) {
        self.inner.backlog.lock().unwrap().extend(updates);
    }

    /// Updates that arrive during the session.
    pub fn push_live(&self, updates: Vec<Update>) {
        self.inner.live.lock().unwrap().extend(updates);
    }

    /// Cancel `token` as soon as a poll finds nothing left to deliver.
    pub fn stop_when_idle(&self, token: CancellationToken) {
        *self.inner.stop_when_idle.lock().unwrap() = Some(token);
    }

    pub fn fail_on_poll(&self, n: usize) {
        *self.inner.fail_on_poll.lock().unwrap() = Some(n);
    }

    pub fn polls(&self) -> usize {
        *self.inner.polls.lock().unwrap()
    }

    pub fn drops(&self) -> usize {
        *self.inner.drops.lock().unwrap()
    }

    pub fn closed_with(&self) -> Option<Option<i32>> {
        *self.inner.closed_with.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.inner.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateTransport for MockClient {
    async fn drop_pending_updates(&self) -> Result<()> {
        *self.inner.drops.lock().unwrap() += 1;
        self.inner.backlog.lock().unwrap().clear();
        Ok(())
    }

    async fn get_updates(&self, offset: Option<i32>, _timeout: Duration) -> Result<Vec<Update>> {
        let poll = {
            let mut polls = self.inner.polls.lock().unwrap();
            *polls += 1;
            *polls
        };
        if *self.inner.fail_on_poll.lock().unwrap() == Some(poll) {
            return Err(Error::Transport("connection reset".to_string()));
        }

        let min = offset.unwrap_or(i32::MIN);
        let mut out = Vec::new();
        for store in [&self.inner.backlog, &self.inner.live] {
            let mut store = store.lock().unwrap();
            out.extend(store.iter().filter(|u| u.id >= min).cloned());
            store.clear();
        }

        if out.is_empty() {
            if let Some(token) = self.inner.stop_when_idle.lock().unwrap().as_ref() {
                token.cancel();
            }
        }
        Ok(out)
    }

    async fn close(&self, offset: Option<i32>) -> Result<()> {
        *self.inner.closed_with.lock().unwrap() = Some(offset);
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for MockClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let mut sent = self.inner.sent.lock().unwrap();
        sent.push((chat_id, text.to_string()));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sent.len() as i32),
        })
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.send_text(chat_id, html).await
    }
}

impl BotClient for MockClient {}

pub fn config(addr: SocketAddr, health_check_enabled: bool) -> Arc<BotConfig> {
    Arc::new(BotConfig {
        token: "123:test".to_string(),
        port: addr.port(),
        health_check_enabled,
        health_bind_addr: addr.ip(),
        bot_identifier: BOT_IDENTIFIER.to_string(),
    })
}

/// A loopback address whose port was free a moment ago.
pub fn free_addr() -> SocketAddr {
    let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap()
}

pub fn fast_settings() -> PollSettings {
    PollSettings {
        poll_interval: Duration::from_millis(1),
        ..PollSettings::default()
    }
}

pub fn text(id: i32, body: &str) -> Update {
    Update::new(
        id,
        UpdateKind::Message(Message {
            chat_id: ChatId(100),
            message_id: MessageId(id),
            from: None,
            text: Some(body.to_string()),
            new_chat_members: vec![],
        }),
    )
}
