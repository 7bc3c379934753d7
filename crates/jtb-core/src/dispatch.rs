//! Update routing.
//!
//! Routes are tried in registration order and the first match consumes the
//! update. The built-in filters are mutually exclusive: commands and
//! `TextNotCommand` only see new messages, `EditedMessage` only sees edits and
//! `NewChatMembers` only sees member service messages, so order only matters
//! for custom predicates.

use std::{collections::HashSet, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::{
    config::BotConfig, errors::Error, ports::MessagingPort, stats::BotStats, update::Update,
    Result,
};

/// Everything a handler may touch while replying.
#[derive(Clone)]
pub struct HandlerContext {
    pub messenger: Arc<dyn MessagingPort>,
    pub config: Arc<BotConfig>,
    pub stats: Arc<BotStats>,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, update: &Update) -> Result<()>;
}

/// Receives every error returned by a registered handler. It cannot fail.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle_error(&self, ctx: &HandlerContext, update: &Update, error: Error);
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerContext, Update) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: &HandlerContext, update: &Update) -> Result<()> {
        (self.0)(ctx.clone(), update.clone()).await
    }
}

struct FnErrorHandler<F>(F);

#[async_trait]
impl<F, Fut> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(HandlerContext, Update, Error) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle_error(&self, ctx: &HandlerContext, update: &Update, error: Error) {
        (self.0)(ctx.clone(), update.clone(), error).await
    }
}

/// Wrap an async fn `(ctx, update) -> Result<()>` as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(HandlerContext, Update) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Wrap an async fn `(ctx, update, error)` as the error handler.
pub fn error_handler_fn<F, Fut>(f: F) -> Arc<dyn ErrorHandler>
where
    F: Fn(HandlerContext, Update, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnErrorHandler(f))
}

/// Predicate over the shape of an incoming update.
#[derive(Clone)]
pub enum MessageFilter {
    /// A new message announcing members joining the chat.
    NewChatMembers,
    /// A new text message that is not a `/command`.
    TextNotCommand,
    /// Any edited message.
    EditedMessage,
    Custom {
        name: String,
        predicate: Arc<dyn Fn(&Update) -> bool + Send + Sync>,
    },
}

impl MessageFilter {
    pub fn custom(
        name: impl Into<String>,
        predicate: impl Fn(&Update) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MessageFilter::NewChatMembers => "new_chat_members",
            MessageFilter::TextNotCommand => "text",
            MessageFilter::EditedMessage => "edited_message",
            MessageFilter::Custom { name, .. } => name,
        }
    }

    pub fn matches(&self, update: &Update) -> bool {
        match self {
            MessageFilter::NewChatMembers => update
                .message()
                .is_some_and(|m| !m.new_chat_members.is_empty()),
            MessageFilter::TextNotCommand => update
                .message()
                .is_some_and(|m| m.text.is_some() && !m.is_command()),
            MessageFilter::EditedMessage => update.edited_message().is_some(),
            MessageFilter::Custom { predicate, .. } => predicate(update),
        }
    }
}

impl fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageFilter({})", self.name())
    }
}

#[derive(Debug)]
enum Matcher {
    Command(String),
    Message(MessageFilter),
}

struct Route {
    key: String,
    matcher: Matcher,
    handler: Arc<dyn Handler>,
}

/// Result of routing a single update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { route: String },
    Failed { route: String },
    Unhandled,
}

#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
    keys: HashSet<String>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Our own username; `/cmd@other_bot` is then ignored.
    pub fn set_bot_username(&mut self, username: Option<String>) {
        self.bot_username = username.map(|u| u.trim_start_matches('@').to_string());
    }

    pub fn register_command(&mut self, name: &str, handler: Arc<dyn Handler>) -> Result<()> {
        let name = name.trim_start_matches('/');
        if !is_valid_command_name(name) {
            return Err(Error::Registration(format!(
                "invalid command name {name:?}: expected 1-32 chars of [a-z0-9_]"
            )));
        }
        self.push_route(
            format!("/{name}"),
            Matcher::Command(name.to_string()),
            handler,
        )
    }

    pub fn register_message_handler(
        &mut self,
        filter: MessageFilter,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        if filter.name().trim().is_empty() {
            return Err(Error::Registration(
                "message filter name must not be empty".to_string(),
            ));
        }
        self.push_route(
            format!("message:{}", filter.name()),
            Matcher::Message(filter),
            handler,
        )
    }

    pub fn register_error_handler(&mut self, handler: Arc<dyn ErrorHandler>) -> Result<()> {
        if self.error_handler.is_some() {
            return Err(Error::Registration(
                "an error handler is already registered".to_string(),
            ));
        }
        self.error_handler = Some(handler);
        Ok(())
    }

    fn push_route(&mut self, key: String, matcher: Matcher, handler: Arc<dyn Handler>) -> Result<()> {
        if !self.keys.insert(key.clone()) {
            return Err(Error::Registration(format!("{key} is already registered")));
        }
        debug!(route = %key, "registered handler");
        self.routes.push(Route {
            key,
            matcher,
            handler,
        });
        Ok(())
    }

    /// Check the registration is complete enough to start polling.
    pub fn validate(&self) -> Result<()> {
        if self.routes.is_empty() {
            return Err(Error::Registration("no handlers registered".to_string()));
        }
        Ok(())
    }

    pub fn route_keys(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.key.as_str())
    }

    pub fn has_error_handler(&self) -> bool {
        self.error_handler.is_some()
    }

    fn matches(&self, matcher: &Matcher, update: &Update) -> bool {
        match matcher {
            Matcher::Command(name) => {
                let Some(cmd) = update.message().and_then(|m| m.command()) else {
                    return false;
                };
                if &cmd.name != name {
                    return false;
                }
                match (&cmd.mention, &self.bot_username) {
                    (Some(mention), Some(me)) => mention.eq_ignore_ascii_case(me),
                    _ => true,
                }
            }
            Matcher::Message(filter) => filter.matches(update),
        }
    }

    /// Route one update to at most one handler. Handler failures, panics
    /// included, go to the error handler and never escape.
    ///
    /// The handler runs on its own task so a panic stays inside it; updates
    /// are still handled one at a time.
    pub async fn dispatch(&self, ctx: &HandlerContext, update: &Update) -> DispatchOutcome {
        let Some(route) = self
            .routes
            .iter()
            .find(|r| self.matches(&r.matcher, update))
        else {
            debug!(update_id = update.id, "no handler matched");
            return DispatchOutcome::Unhandled;
        };

        let handler = route.handler.clone();
        let (task_ctx, task_update) = (ctx.clone(), update.clone());
        let result = tokio::spawn(async move { handler.handle(&task_ctx, &task_update).await })
            .await
            .unwrap_or_else(|join| Err(Error::Handler(describe_join_error(join))));

        match result {
            Ok(()) => {
                ctx.stats.record_handled();
                DispatchOutcome::Handled {
                    route: route.key.clone(),
                }
            }
            Err(e) => {
                ctx.stats.record_failed();
                match &self.error_handler {
                    Some(h) => h.handle_error(ctx, update, e).await,
                    None => error!(
                        update_id = update.id,
                        route = %route.key,
                        error = %e,
                        "handler failed and no error handler is registered"
                    ),
                }
                DispatchOutcome::Failed {
                    route: route.key.clone(),
                }
            }
        }
    }
}

fn describe_join_error(join: JoinError) -> String {
    if !join.is_panic() {
        return "handler task was cancelled".to_string();
    }
    let payload = join.into_panic();
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("handler panicked: {msg}")
}

fn is_valid_command_name(name: &str) -> bool {
    (1..=32).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}
