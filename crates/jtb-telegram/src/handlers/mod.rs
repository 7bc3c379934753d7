//! Default handler set for Joker's bot.
//!
//! Handlers only see `jtb-core` types and reply through the messaging port, so
//! they run unchanged against the in-memory fakes used in tests.

use tracing::error;

use jtb_core::{
    dispatch::{error_handler_fn, handler_fn, Dispatcher, HandlerContext, MessageFilter},
    errors::Error,
    update::Update,
    Result,
};

pub mod commands;
mod messages;

use commands::Command;

/// Register every command, the message filters and the error handler.
pub fn register(d: &mut Dispatcher) -> Result<()> {
    for cmd in Command::ALL {
        let handler = match cmd {
            Command::Start => handler_fn(commands::start),
            Command::Help => handler_fn(commands::help),
            Command::About => handler_fn(commands::about),
            Command::Dev => handler_fn(commands::dev),
            Command::Stats => handler_fn(commands::stats),
            Command::Deploy => handler_fn(commands::deploy),
        };
        d.register_command(cmd.name(), handler)?;
    }

    d.register_message_handler(MessageFilter::NewChatMembers, handler_fn(messages::welcome))?;
    d.register_message_handler(MessageFilter::TextNotCommand, handler_fn(messages::reply))?;
    d.register_message_handler(MessageFilter::EditedMessage, handler_fn(messages::edited))?;

    d.register_error_handler(error_handler_fn(log_error))?;
    Ok(())
}

/// Errors are logged with their chat; users never see internal failures.
async fn log_error(_ctx: HandlerContext, update: Update, err: Error) {
    let chat = update.chat_id();
    error!(
        update_id = update.id,
        chat_id = %chat.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        group = chat.is_some_and(|c| c.is_group()),
        error = %err,
        "update handler failed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use jtb_core::{
        config::{BotConfig, BOT_IDENTIFIER},
        dispatch::DispatchOutcome,
        domain::{ChatId, MessageId, MessageRef, UserId},
        ports::MessagingPort,
        stats::BotStats,
        update::{Message, UpdateKind, User},
    };

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(ChatId, String)>>,
        fail: bool,
    }

    impl Recorder {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl MessagingPort for Recorder {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            if self.fail {
                return Err(Error::External("telegram error: blocked by user".into()));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.send_text(chat_id, html).await
        }
    }

    fn setup(recorder: Arc<Recorder>) -> (Dispatcher, HandlerContext) {
        let mut d = Dispatcher::new();
        register(&mut d).unwrap();
        let ctx = HandlerContext {
            messenger: recorder,
            config: Arc::new(BotConfig {
                token: "1:a".into(),
                port: 9000,
                health_check_enabled: true,
                health_bind_addr: "127.0.0.1".parse().unwrap(),
                bot_identifier: BOT_IDENTIFIER.into(),
            }),
            stats: Arc::new(BotStats::new()),
        };
        (d, ctx)
    }

    fn user(id: i64, name: &str, is_bot: bool) -> User {
        User {
            id: UserId(id),
            first_name: name.into(),
            username: None,
            is_bot,
        }
    }

    fn message(id: i32, text: Option<&str>) -> Message {
        Message {
            chat_id: ChatId(42),
            message_id: MessageId(id),
            from: Some(user(7, "Ada", false)),
            text: text.map(str::to_string),
            new_chat_members: vec![],
        }
    }

    fn text(id: i32, body: &str) -> Update {
        Update::new(id, UpdateKind::Message(message(id, Some(body))))
    }

    #[test]
    fn registers_every_route_once() {
        let (d, _) = setup(Arc::default());
        let keys: Vec<&str> = d.route_keys().collect();
        assert_eq!(
            keys,
            vec![
                "/start",
                "/help",
                "/about",
                "/dev",
                "/stats",
                "/deploy",
                "message:new_chat_members",
                "message:text",
                "message:edited_message",
            ]
        );
        assert!(d.has_error_handler());
        assert!(d.validate().is_ok());
    }

    #[tokio::test]
    async fn start_greets_sender_by_first_name() {
        let rec = Arc::new(Recorder::default());
        let (d, ctx) = setup(rec.clone());

        let out = d.dispatch(&ctx, &text(1, "/start")).await;
        assert_eq!(out, DispatchOutcome::Handled { route: "/start".into() });
        assert!(rec.texts()[0].starts_with("Hey Ada!"));
    }

    #[tokio::test]
    async fn deploy_reports_health_flag_and_port() {
        let rec = Arc::new(Recorder::default());
        let (d, ctx) = setup(rec.clone());

        d.dispatch(&ctx, &text(1, "/deploy")).await;
        let reply = &rec.texts()[0];
        assert!(reply.contains("Health check: enabled"), "{reply}");
        assert!(reply.contains("Port: 9000"), "{reply}");
    }

    #[tokio::test]
    async fn stats_reflect_handled_updates() {
        let rec = Arc::new(Recorder::default());
        let (d, ctx) = setup(rec.clone());

        d.dispatch(&ctx, &text(1, "hello")).await;
        d.dispatch(&ctx, &text(2, "/stats")).await;
        let reply = rec.texts().pop().unwrap();
        assert!(reply.contains("Handled: 1"), "{reply}");
        assert!(reply.contains("Failed: 0"), "{reply}");
    }

    #[tokio::test]
    async fn plain_text_gets_a_reply() {
        let rec = Arc::new(Recorder::default());
        let (d, ctx) = setup(rec.clone());

        d.dispatch(&ctx, &text(1, "hey bot")).await;
        d.dispatch(&ctx, &text(2, "tell me a joke")).await;
        d.dispatch(&ctx, &text(3, "what's the weather")).await;
        let replies = rec.texts();
        assert_eq!(replies[0], "Hello, Ada!");
        assert!(!replies[1].contains("/help"));
        assert!(replies[2].contains("/help"));
    }

    #[tokio::test]
    async fn welcomes_humans_only() {
        let rec = Arc::new(Recorder::default());
        let (d, ctx) = setup(rec.clone());

        let mut joined = message(5, None);
        joined.new_chat_members = vec![user(8, "<Bob>", false), user(9, "Helper", true)];
        let out = d
            .dispatch(&ctx, &Update::new(5, UpdateKind::Message(joined)))
            .await;

        assert_eq!(
            out,
            DispatchOutcome::Handled {
                route: "message:new_chat_members".into()
            }
        );
        let replies = rec.texts();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("<b>&lt;Bob&gt;</b>"), "{}", replies[0]);
    }

    #[tokio::test]
    async fn edits_are_acknowledged() {
        let rec = Arc::new(Recorder::default());
        let (d, ctx) = setup(rec.clone());

        let edit = Update::new(3, UpdateKind::EditedMessage(message(3, Some("/start"))));
        let out = d.dispatch(&ctx, &edit).await;
        assert_eq!(
            out,
            DispatchOutcome::Handled {
                route: "message:edited_message".into()
            }
        );
        assert_eq!(rec.texts(), vec!["I saw that edit."]);
    }

    #[tokio::test]
    async fn send_failure_is_logged_not_replied() {
        let rec = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let (d, ctx) = setup(rec.clone());

        let out = d.dispatch(&ctx, &text(1, "/help")).await;
        assert_eq!(out, DispatchOutcome::Failed { route: "/help".into() });
        assert!(rec.texts().is_empty());
        assert_eq!(ctx.stats.snapshot().failed, 1);
    }
}
