use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use jtb_core::{config::BotConfig, lifecycle::BotLifecycle, polling::PollSettings};
use jtb_telegram::{handlers, TelegramClient};

#[tokio::main]
async fn main() -> Result<(), jtb_core::Error> {
    jtb_core::logging::init("jtb")?;

    let cfg = Arc::new(BotConfig::load()?);
    info!(config = ?cfg, "configuration loaded");

    let settings = PollSettings::default();
    let mut bot = BotLifecycle::new(cfg).with_poll_settings(settings);
    bot.setup(
        |cfg| TelegramClient::connect(cfg, settings),
        handlers::register,
    )
    .await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let report = bot.start(shutdown).await?;
    info!(
        updates = report.updates,
        handled = bot.stats().snapshot().handled,
        "bot stopped"
    );
    Ok(())
}

/// Cancel `token` on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
    token.cancel();
}
