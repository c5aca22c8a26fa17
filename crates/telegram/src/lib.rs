//! Telegram bot channel.
//!
//! Updates arrive through the gateway's webhook route; replies are pushed
//! with teloxide. Only the configured chat may drive the stream.

pub mod bot;
pub mod command;
pub mod error;
pub mod handler;
pub mod outbound;

pub use {
    command::Command,
    error::{Error, Result},
    handler::{Handled, TelegramChannel},
    outbound::TelegramOutbound,
};

pub use teloxide::types::Update;
