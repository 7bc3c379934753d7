use std::net::SocketAddr;

use tokio::{net::TcpListener, task::JoinHandle};
use tracing::warn;

use crate::{errors::Error, health::responder::router, Result};

/// Owned handle to the running health server.
///
/// Dropping the handle detaches the task; it is never joined and dies with
/// the runtime.
#[derive(Debug)]
pub struct HealthServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HealthServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Bind `addr` and serve the health responder in the background.
///
/// Bind failures come back as [`Error::HealthBind`]; the caller decides
/// whether that is fatal.
pub async fn start(addr: SocketAddr, bot_identifier: &str) -> Result<HealthServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::HealthBind { addr, source })?;
    let local_addr = listener.local_addr()?;
    let app = router(bot_identifier);

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "health server stopped");
        }
    });

    Ok(HealthServerHandle { local_addr, task })
}
