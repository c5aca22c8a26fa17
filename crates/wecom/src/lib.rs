//! WeCom (corporate WeChat) application support: callback message crypto,
//! inbound message parsing and menu provisioning.

pub mod crypto;
pub mod error;
pub mod menu;
pub mod message;

pub use {
    crypto::{MessageCrypto, WxCrypt},
    error::{CryptoError, Error, Result},
    menu::{Menu, MenuClient},
    message::InboundMessage,
};
