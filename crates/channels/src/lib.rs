//! Delivery of transition outcomes back to the chat that asked for them.
//!
//! WeCom replies travel inline as XML in the webhook response; Telegram
//! replies are pushed through the bot API. [`deliver`] picks the route from
//! the request's [`ReplyTarget`].

pub mod error;
pub mod format;
pub mod gating;
pub mod outbound;

pub use {
    error::{Error, Result},
    format::{Delivery, deliver},
    gating::is_authorized,
    homegate_common::{Correlation, ReplyTarget},
    outbound::PushOutbound,
};
