//! Platform-neutral incoming update model.
//!
//! Telegram-specific fields live in the adapter; only the shapes the
//! dispatcher routes on are kept here.

use crate::domain::{ChatId, MessageId, MessageRef, UserId};

#[derive(Clone, Debug)]
pub struct Update {
    /// Monotonic update id assigned by the platform; drives the poll offset.
    pub id: i32,
    pub kind: UpdateKind,
}

#[derive(Clone, Debug)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    /// Anything the bot does not route on (callbacks, channel posts, ...).
    Other,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub from: Option<User>,
    pub text: Option<String>,
    pub new_chat_members: Vec<User>,
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub username: Option<String>,
    pub is_bot: bool,
}

/// A `/command@bot args` invocation parsed from message text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub mention: Option<String>,
    pub args: String,
}

impl Update {
    pub fn new(id: i32, kind: UpdateKind) -> Self {
        Self { id, kind }
    }

    /// The message for new-message updates only.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn edited_message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::EditedMessage(m) => Some(m),
            _ => None,
        }
    }

    /// The message carried by the update, new or edited.
    pub fn effective_message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m) | UpdateKind::EditedMessage(m) => Some(m),
            UpdateKind::Other => None,
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.effective_message().map(|m| m.chat_id)
    }
}

impl Message {
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    pub fn command(&self) -> Option<ParsedCommand> {
        self.text.as_deref().and_then(parse_command)
    }

    pub fn is_command(&self) -> bool {
        self.command().is_some()
    }
}

impl User {
    /// `@username` when available, otherwise the first name.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(u) => format!("@{u}"),
            None => self.first_name.clone(),
        }
    }
}

/// Parse `/cmd@botname arg1 ...`. Returns `None` for text that is not a
/// command (no leading slash, or an empty command name).
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let text = text.trim_start();
    let rest = text.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim().to_string();

    let (name, mention) = match head.split_once('@') {
        Some((name, bot)) => (name, Some(bot.to_string()).filter(|b| !b.is_empty())),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_lowercase(),
        mention,
        args,
    })
}
