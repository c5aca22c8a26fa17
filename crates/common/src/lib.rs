//! Shared types and error definitions used across the homegate crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, Result},
    types::{Correlation, ReplyTarget, StreamState},
};
