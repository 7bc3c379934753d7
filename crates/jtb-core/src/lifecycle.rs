//! Startup ordering: client + handlers, health server, then polling.

use std::{future::Future, net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::BotConfig,
    dispatch::{Dispatcher, HandlerContext},
    errors::Error,
    health::{self, HealthServerHandle},
    polling::{run_polling, PollReport, PollSettings},
    ports::{MessagingPort, UpdateTransport},
    stats::BotStats,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    HandlersRegistered,
    HealthServerRunning,
    Polling,
    Stopped,
}

impl LifecycleState {
    fn rank(self) -> u8 {
        match self {
            LifecycleState::Uninitialized => 0,
            LifecycleState::HandlersRegistered => 1,
            LifecycleState::HealthServerRunning => 2,
            LifecycleState::Polling => 3,
            LifecycleState::Stopped => 4,
        }
    }

    /// Forward-only; `Stopped` is reachable from anywhere and leads nowhere.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        self != LifecycleState::Stopped && next.rank() > self.rank()
    }
}

/// A platform client usable by the lifecycle: it must both poll and reply.
pub trait BotClient: UpdateTransport + MessagingPort {
    /// Our username on the platform, used to ignore `/cmd@other_bot`.
    fn bot_username(&self) -> Option<String> {
        None
    }
}

pub struct BotLifecycle<C> {
    cfg: Arc<BotConfig>,
    settings: PollSettings,
    state: LifecycleState,
    client: Option<Arc<C>>,
    dispatcher: Option<Arc<Dispatcher>>,
    health: Option<HealthServerHandle>,
    stats: Arc<BotStats>,
}

impl<C> BotLifecycle<C>
where
    C: BotClient + 'static,
{
    pub fn new(cfg: Arc<BotConfig>) -> Self {
        Self {
            cfg,
            settings: PollSettings::default(),
            state: LifecycleState::Uninitialized,
            client: None,
            dispatcher: None,
            health: None,
            stats: Arc::new(BotStats::new()),
        }
    }

    pub fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn poll_settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<BotStats> {
        self.stats.clone()
    }

    pub fn health_server(&self) -> Option<&HealthServerHandle> {
        self.health.as_ref()
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        }
    }

    /// Build the client and register every handler. Any failure stops the
    /// lifecycle; polling is then impossible.
    pub async fn setup<F, Fut, R>(&mut self, connect: F, register: R) -> Result<()>
    where
        F: FnOnce(Arc<BotConfig>) -> Fut,
        Fut: Future<Output = Result<C>>,
        R: FnOnce(&mut Dispatcher) -> Result<()>,
    {
        if self.state != LifecycleState::Uninitialized {
            return Err(Error::Setup(format!(
                "setup called in state {:?}",
                self.state
            )));
        }

        let (client, dispatcher) = match self.build(connect, register).await {
            Ok(parts) => parts,
            Err(e) => {
                error!(error = %e, "Failed to setup bot");
                self.transition(LifecycleState::Stopped);
                return Err(e);
            }
        };

        self.client = Some(Arc::new(client));
        self.dispatcher = Some(Arc::new(dispatcher));
        self.transition(LifecycleState::HandlersRegistered);
        info!("Bot handlers configured successfully");

        if self.cfg.health_check_enabled {
            self.ensure_health_server().await;
        }
        Ok(())
    }

    async fn build<F, Fut, R>(&self, connect: F, register: R) -> Result<(C, Dispatcher)>
    where
        F: FnOnce(Arc<BotConfig>) -> Fut,
        Fut: Future<Output = Result<C>>,
        R: FnOnce(&mut Dispatcher) -> Result<()>,
    {
        let client = connect(self.cfg.clone()).await.map_err(|e| match e {
            Error::Setup(_) => e,
            other => Error::Setup(format!("client construction failed: {other}")),
        })?;

        let mut dispatcher = Dispatcher::new();
        dispatcher.set_bot_username(client.bot_username());
        register(&mut dispatcher)?;
        dispatcher.validate()?;
        Ok((client, dispatcher))
    }

    /// Start the health server unless it is disabled or already running.
    /// A bind failure is logged and otherwise ignored.
    pub async fn ensure_health_server(&mut self) -> Option<SocketAddr> {
        if !self.cfg.health_check_enabled {
            return None;
        }
        if let Some(h) = &self.health {
            return Some(h.local_addr());
        }

        match health::start(self.cfg.health_addr(), &self.cfg.bot_identifier).await {
            Ok(handle) => {
                let addr = handle.local_addr();
                info!(%addr, "Health check server started");
                self.health = Some(handle);
                if self.state == LifecycleState::HandlersRegistered {
                    self.transition(LifecycleState::HealthServerRunning);
                }
                Some(addr)
            }
            Err(e) => {
                warn!(error = %e, "Could not start health server");
                None
            }
        }
    }

    /// Poll until `shutdown` is cancelled. Must follow a successful
    /// [`setup`](Self::setup).
    pub async fn start(&mut self, shutdown: CancellationToken) -> Result<PollReport> {
        let ready = matches!(
            self.state,
            LifecycleState::HandlersRegistered | LifecycleState::HealthServerRunning
        );
        let (client, dispatcher) = match (&self.client, &self.dispatcher) {
            (Some(c), Some(d)) if ready => (c.clone(), d.clone()),
            _ => {
                let e = Error::Setup("bot application not properly initialized".to_string());
                error!(error = %e, "Error starting bot");
                return Err(e);
            }
        };

        if self.cfg.health_check_enabled && self.health.is_none() {
            self.ensure_health_server().await;
        }

        info!("Starting Joker's Telegram Bot...");
        info!(enabled = self.cfg.health_check_enabled, "Health check");
        info!(port = self.cfg.port, "Port configured");

        let messenger: Arc<dyn MessagingPort> = client.clone();
        let ctx = HandlerContext {
            messenger,
            config: self.cfg.clone(),
            stats: self.stats.clone(),
        };

        self.transition(LifecycleState::Polling);
        let result = run_polling(
            client.as_ref(),
            &dispatcher,
            &ctx,
            &self.settings,
            &shutdown,
        )
        .await;
        self.transition(LifecycleState::Stopped);

        result.map_err(|e| {
            if e.is_fatal() {
                error!(error = %e, "Error running bot");
            } else {
                warn!(error = %e, "Polling stopped on a recoverable error");
            }
            e
        })
    }
}
