use std::{
    collections::HashMap,
    env, fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use crate::{errors::Error, Result};

/// Identifier reported by the health endpoint.
pub const BOT_IDENTIFIER: &str = "jokers-telegram-bot";

pub const DEFAULT_PORT: u16 = 8080;

/// Environment variables whose presence means we run on a hosting platform
/// that probes `/health`.
pub const DEPLOYMENT_MARKERS: &[&str] = &[
    "RENDER",
    "RENDER_SERVICE_ID",
    "RAILWAY_ENVIRONMENT",
    "FLY_APP_NAME",
    "DYNO",
];

/// Read-only view over environment variables.
pub trait EnvReader {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvReader for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Typed, immutable configuration. Built once at process entry and shared as
/// `Arc<BotConfig>`.
#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
    pub port: u16,
    pub health_check_enabled: bool,
    pub health_bind_addr: IpAddr,
    pub bot_identifier: String,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("port", &self.port)
            .field("health_check_enabled", &self.health_check_enabled)
            .field("health_bind_addr", &self.health_bind_addr)
            .field("bot_identifier", &self.bot_identifier)
            .finish()
    }
}

impl BotConfig {
    /// Load from the process environment, reading `.env` first if present.
    /// Variables already set are never overridden by `.env`.
    pub fn load() -> Result<Self> {
        dotenv_outcome(dotenvy::dotenv())?;
        Self::from_env(&ProcessEnv)
    }

    pub fn from_env(env: &impl EnvReader) -> Result<Self> {
        let token = env
            .var("BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| env.var("TELEGRAM_BOT_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config("BOT_TOKEN environment variable is required".to_string())
            })?;

        let port = match env.var("PORT").and_then(non_empty) {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };

        let explicit = match env.var("HEALTH_CHECK_ENABLED").and_then(non_empty) {
            Some(raw) => Some(parse_bool(&raw).ok_or_else(|| {
                Error::Config(format!("HEALTH_CHECK_ENABLED must be a boolean, got {raw:?}"))
            })?),
            None => None,
        };
        let health_check_enabled = resolve_health_check_enabled(explicit, env);

        let health_bind_addr = match env.var("HEALTH_BIND_ADDR").and_then(non_empty) {
            Some(raw) => raw.trim().parse::<IpAddr>().map_err(|e| {
                Error::Config(format!("HEALTH_BIND_ADDR is not an IP address: {e}"))
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        Ok(Self {
            token: token.trim().to_string(),
            port,
            health_check_enabled,
            health_bind_addr,
            bot_identifier: BOT_IDENTIFIER.to_string(),
        })
    }

    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::new(self.health_bind_addr, self.port)
    }
}

/// Explicit value wins; otherwise any deployment marker enables the health
/// endpoint; otherwise it stays off.
pub fn resolve_health_check_enabled(explicit: Option<bool>, env: &impl EnvReader) -> bool {
    if let Some(flag) = explicit {
        return flag;
    }
    DEPLOYMENT_MARKERS
        .iter()
        .any(|key| env.var(key).and_then(non_empty).is_some())
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "PORT must be an integer in 1..=65535, got {raw:?}"
        ))),
        Ok(port) => Ok(port),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A missing `.env` is fine; one that exists but cannot be read or parsed is
/// a config error.
fn dotenv_outcome<T>(res: dotenvy::Result<T>) -> Result<()> {
    match res {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!("failed to load .env: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn explicit_flag_wins_over_markers() {
        let env = env_of(&[("RENDER", "true")]);
        assert!(!resolve_health_check_enabled(Some(false), &env));
        assert!(resolve_health_check_enabled(Some(true), &env_of(&[])));
    }

    #[test]
    fn markers_enable_health_check() {
        assert!(resolve_health_check_enabled(
            None,
            &env_of(&[("RENDER_SERVICE_ID", "srv-123")])
        ));
        assert!(resolve_health_check_enabled(None, &env_of(&[("DYNO", "web.1")])));
    }

    #[test]
    fn empty_marker_does_not_count() {
        assert!(!resolve_health_check_enabled(None, &env_of(&[("RENDER", "")])));
        assert!(!resolve_health_check_enabled(None, &env_of(&[])));
    }

    #[test]
    fn loads_defaults() {
        let cfg = BotConfig::from_env(&env_of(&[("BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(cfg.token, "123:abc");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(!cfg.health_check_enabled);
        assert_eq!(cfg.bot_identifier, BOT_IDENTIFIER);
        assert_eq!(cfg.health_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn falls_back_to_telegram_bot_token() {
        let cfg = BotConfig::from_env(&env_of(&[
            ("BOT_TOKEN", "  "),
            ("TELEGRAM_BOT_TOKEN", "42:xyz"),
        ]))
        .unwrap();
        assert_eq!(cfg.token, "42:xyz");
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = BotConfig::from_env(&env_of(&[("PORT", "9000")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_out_of_range_port() {
        for bad in ["0", "65536", "-1", "http"] {
            let err = BotConfig::from_env(&env_of(&[("BOT_TOKEN", "1:a"), ("PORT", bad)]))
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)), "port {bad} accepted");
        }
        let cfg =
            BotConfig::from_env(&env_of(&[("BOT_TOKEN", "1:a"), ("PORT", "65535")])).unwrap();
        assert_eq!(cfg.port, 65535);
    }

    #[test]
    fn explicit_flag_parsing() {
        let cfg = BotConfig::from_env(&env_of(&[
            ("BOT_TOKEN", "1:a"),
            ("HEALTH_CHECK_ENABLED", "Yes"),
        ]))
        .unwrap();
        assert!(cfg.health_check_enabled);

        let cfg = BotConfig::from_env(&env_of(&[
            ("BOT_TOKEN", "1:a"),
            ("HEALTH_CHECK_ENABLED", "off"),
            ("RENDER", "1"),
        ]))
        .unwrap();
        assert!(!cfg.health_check_enabled);

        let err = BotConfig::from_env(&env_of(&[
            ("BOT_TOKEN", "1:a"),
            ("HEALTH_CHECK_ENABLED", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = BotConfig::from_env(&env_of(&[("BOT_TOKEN", "123:supersecret")])).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("supersecret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn custom_bind_addr() {
        let cfg = BotConfig::from_env(&env_of(&[
            ("BOT_TOKEN", "1:a"),
            ("HEALTH_BIND_ADDR", "127.0.0.1"),
            ("PORT", "10000"),
        ]))
        .unwrap();
        assert_eq!(cfg.health_addr().to_string(), "127.0.0.1:10000");
    }

    #[test]
    fn missing_dotenv_is_ignored() {
        assert!(dotenv_outcome(dotenvy::from_filename("jtb-no-such-file.env")).is_ok());
    }

    #[test]
    fn malformed_dotenv_is_a_config_error() {
        let path = env::temp_dir().join(format!("jtb-broken-{}.env", std::process::id()));
        std::fs::write(&path, "JTB_BROKEN_LINE \"oops\n").unwrap();

        let res = dotenv_outcome(dotenvy::from_path(&path));
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(Error::Config(_))), "{res:?}");
    }
}
