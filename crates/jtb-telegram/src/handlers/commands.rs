use teloxide::utils::command::BotCommands;

use jtb_core::{
    dispatch::HandlerContext, domain::ChatId, errors::Error, formatting::format_duration,
    update::Update, Result,
};

/// Commands published to Telegram's menu and registered with the dispatcher.
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "say hello")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "what this bot is")]
    About,
    #[command(description = "build and runtime details")]
    Dev,
    #[command(description = "uptime and update counters")]
    Stats,
    #[command(description = "deployment settings")]
    Deploy,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Help,
        Command::About,
        Command::Dev,
        Command::Stats,
        Command::Deploy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::About => "about",
            Command::Dev => "dev",
            Command::Stats => "stats",
            Command::Deploy => "deploy",
        }
    }
}

fn chat_of(update: &Update) -> Result<ChatId> {
    update
        .chat_id()
        .ok_or_else(|| Error::Handler(format!("update {} carries no chat", update.id)))
}

pub async fn start(ctx: HandlerContext, update: Update) -> Result<()> {
    let chat = chat_of(&update)?;
    let name = update
        .message()
        .and_then(|m| m.from.as_ref())
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "there".to_string());

    let text = format!(
        "Hey {name}! I'm Joker's bot.\n\nAsk me for a joke, or send /help to see what I can do."
    );
    ctx.messenger.send_text(chat, &text).await?;
    Ok(())
}

pub async fn help(ctx: HandlerContext, update: Update) -> Result<()> {
    let chat = chat_of(&update)?;
    ctx.messenger
        .send_text(chat, &Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub async fn about(ctx: HandlerContext, update: Update) -> Result<()> {
    let chat = chat_of(&update)?;
    let html = "<b>Joker's Telegram Bot</b>\n\
                Welcomes new members, answers greetings and tells the occasional joke.";
    ctx.messenger.send_html(chat, html).await?;
    Ok(())
}

pub async fn dev(ctx: HandlerContext, update: Update) -> Result<()> {
    let chat = chat_of(&update)?;
    let html = format!(
        "<b>Developer info</b>\n\
         Version: <code>{}</code>\n\
         Runtime: Rust + tokio, teloxide long polling",
        env!("CARGO_PKG_VERSION")
    );
    ctx.messenger.send_html(chat, &html).await?;
    Ok(())
}

pub async fn stats(ctx: HandlerContext, update: Update) -> Result<()> {
    let chat = chat_of(&update)?;
    let s = ctx.stats.snapshot();
    let html = format!(
        "<b>Bot statistics</b>\n\
         Uptime: {}\n\
         Updates received: {}\n\
         Handled: {}\n\
         Failed: {}",
        format_duration(s.uptime_secs),
        s.received,
        s.handled,
        s.failed
    );
    ctx.messenger.send_html(chat, &html).await?;
    Ok(())
}

pub async fn deploy(ctx: HandlerContext, update: Update) -> Result<()> {
    let chat = chat_of(&update)?;
    let cfg = &ctx.config;
    let health = if cfg.health_check_enabled {
        "enabled"
    } else {
        "disabled"
    };
    let html = format!(
        "<b>Deployment</b>\n\
         Health check: {health}\n\
         Port: {}\n\
         Bot: <code>{}</code>",
        cfg.port, cfg.bot_identifier
    );
    ctx.messenger.send_html(chat, &html).await?;
    Ok(())
}
