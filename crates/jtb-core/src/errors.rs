use std::net::SocketAddr;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the lifecycle
/// can tell fatal setup/transport failures apart from per-update handler
/// failures and the non-fatal health server bind failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("handler registration failed: {0}")]
    Registration(String),

    #[error("health server could not bind {addr}: {source}")]
    HealthBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("handler error: {0}")]
    Handler(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Errors that must abort startup rather than be logged and skipped.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::HealthBind { .. } | Error::Handler(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
