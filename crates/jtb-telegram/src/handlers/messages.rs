use tracing::debug;

use jtb_core::{
    dispatch::HandlerContext, errors::Error, formatting::escape_html, update::Update, Result,
};

const GREETINGS: &[&str] = &["hi", "hello", "hey", "hola", "yo"];

const JOKES: &[&str] = &[
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "I told my computer I needed a break, and it said: \"No problem, I'll go to sleep.\"",
    "There are 10 kinds of people: those who understand binary and those who don't.",
    "A SQL query walks into a bar, goes up to two tables and asks: \"Can I join you?\"",
    "Why did the developer go broke? Because they used up all their cache.",
];

fn pick_joke(seed: i32) -> &'static str {
    JOKES[seed.rem_euclid(JOKES.len() as i32) as usize]
}

fn is_greeting(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|w| GREETINGS.iter().any(|g| w.eq_ignore_ascii_case(g)))
}

/// Greet every human that joined; bots joining are ignored.
pub async fn welcome(ctx: HandlerContext, update: Update) -> Result<()> {
    let msg = update
        .message()
        .ok_or_else(|| Error::Handler("member update without message".to_string()))?;

    for member in msg.new_chat_members.iter().filter(|m| !m.is_bot) {
        let html = format!(
            "Welcome, <b>{}</b>! Send /help to see what I can do.",
            escape_html(&member.display_name())
        );
        ctx.messenger.send_html(msg.chat_id, &html).await?;
    }
    Ok(())
}

/// Replies to plain text: greetings, joke requests, otherwise a hint.
pub async fn reply(ctx: HandlerContext, update: Update) -> Result<()> {
    let msg = update
        .message()
        .ok_or_else(|| Error::Handler("text update without message".to_string()))?;
    let text = msg.text.as_deref().unwrap_or_default();

    let answer = if is_greeting(text) {
        let name = msg
            .from
            .as_ref()
            .map(|u| u.first_name.as_str())
            .unwrap_or("friend");
        format!("Hello, {name}!")
    } else if text.to_lowercase().contains("joke") {
        pick_joke(msg.message_id.0).to_string()
    } else {
        "I'm not sure what to say to that. Try /help.".to_string()
    };

    ctx.messenger.send_text(msg.chat_id, &answer).await?;
    Ok(())
}

pub async fn edited(ctx: HandlerContext, update: Update) -> Result<()> {
    let msg = update
        .edited_message()
        .ok_or_else(|| Error::Handler("edit update without message".to_string()))?;
    debug!(message = %msg.reference(), "message edited");

    ctx.messenger
        .send_text(msg.chat_id, "I saw that edit.")
        .await?;
    Ok(())
}
