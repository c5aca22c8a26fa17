//! Nginx Proxy Manager client.
//!
//! Toggles a single stream through the proxy manager's REST API and
//! classifies the answer into [`ApplyOutcome`], separating the idempotent
//! "already in that state" rejections from real failures.

pub mod auth;
pub mod client;
pub mod error;

pub use {
    client::{ApplyOutcome, NpmClient, StreamControl},
    error::{Error, Result},
};
