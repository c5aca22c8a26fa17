use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No bearer token could be obtained (transport error or non-2xx).
    #[error("proxy manager authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// The state-change call was rejected for a reason other than the two
    /// recognised "already ..." messages.
    #[error("stream {action} rejected with status {status}: {body}")]
    ApplyFailed {
        action: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid proxy configuration: {message}")]
    Config { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn auth_failed(reason: impl std::fmt::Display) -> Self {
        Self::AuthFailed {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
