use std::error::Error as StdError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to get a transition's reply to the chat that asked for it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The reply target needs a client that is not wired up.
    #[error("reply delivery unavailable: {message}")]
    Unavailable { message: String },

    /// The chat platform refused or never answered.
    #[error("reply delivery failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
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
