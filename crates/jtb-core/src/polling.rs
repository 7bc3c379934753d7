use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dispatch::{Dispatcher, HandlerContext},
    ports::UpdateTransport,
    Result,
};

/// Long-poll configuration.
///
/// `timeout` is the server-side long-poll wait; the per-phase timeouts are
/// applied by the transport's HTTP client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_timeout: Duration,
    pub drop_pending_updates: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            pool_timeout: Duration::from_secs(10),
            drop_pending_updates: true,
        }
    }
}

impl PollSettings {
    /// Whole-request budget for one `getUpdates` call: the long-poll wait plus
    /// the slower of the read/write phases.
    pub fn request_timeout(&self) -> Duration {
        self.timeout + self.read_timeout.max(self.write_timeout)
    }
}

/// What a finished poll session did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    pub cycles: u64,
    pub updates: u64,
    pub last_offset: Option<i32>,
}

/// Run the long-poll loop until `shutdown` is cancelled.
///
/// Every wait races the shutdown token. Errors returned by the transport are
/// fatal; handler errors never are.
pub async fn run_polling(
    transport: &dyn UpdateTransport,
    dispatcher: &Dispatcher,
    ctx: &HandlerContext,
    settings: &PollSettings,
    shutdown: &CancellationToken,
) -> Result<PollReport> {
    let mut report = PollReport::default();

    if settings.drop_pending_updates {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(report),
            res = transport.drop_pending_updates() => res?,
        }
        debug!("dropped pending updates");
    }

    let mut offset: Option<i32> = None;
    loop {
        let batch = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            res = transport.get_updates(offset, settings.timeout) => res?,
        };
        report.cycles += 1;

        for update in batch {
            let next = update.id.saturating_add(1);
            offset = Some(offset.map_or(next, |o| o.max(next)));
            ctx.stats.record_received();
            report.updates += 1;
            dispatcher.dispatch(ctx, &update).await;
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = sleep(settings.poll_interval) => {}
        }
    }

    report.last_offset = offset;
    if let Err(e) = transport.close(offset).await {
        warn!(error = %e, "failed to acknowledge processed updates on shutdown");
    }
    info!(
        cycles = report.cycles,
        updates = report.updates,
        "polling stopped"
    );
    Ok(report)
}
