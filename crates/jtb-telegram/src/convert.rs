//! teloxide types -> `jtb-core` update model.

use teloxide::types as tg;

use jtb_core::{
    domain::{ChatId, MessageId, UserId},
    update::{Message, Update, UpdateKind, User},
};

pub fn update(u: tg::Update) -> Update {
    let kind = match u.kind {
        tg::UpdateKind::Message(m) => UpdateKind::Message(message(&m)),
        tg::UpdateKind::EditedMessage(m) => UpdateKind::EditedMessage(message(&m)),
        _ => UpdateKind::Other,
    };
    Update::new(u.id, kind)
}

pub fn message(m: &tg::Message) -> Message {
    Message {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
        from: m.from().map(user),
        text: m.text().map(str::to_string),
        new_chat_members: m
            .new_chat_members()
            .map(|members| members.iter().map(user).collect())
            .unwrap_or_default(),
    }
}

pub fn user(u: &tg::User) -> User {
    User {
        id: UserId(u.id.0 as i64),
        first_name: u.first_name.clone(),
        username: u.username.clone(),
        is_bot: u.is_bot,
    }
}
