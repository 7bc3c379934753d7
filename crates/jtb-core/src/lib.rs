//! Core of Joker's Telegram Bot.
//!
//! This crate is framework-agnostic. The Telegram client lives behind the
//! ports in [`ports`] and is implemented in the `jtb-telegram` adapter crate.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod polling;
pub mod ports;
pub mod stats;
pub mod update;

pub use errors::{Error, Result};
