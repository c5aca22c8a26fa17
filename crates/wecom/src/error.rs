use std::error::Error as StdError;

/// Failures of the callback crypto, mirroring the numeric codes WeCom's
/// reference libraries report. Signing is infallible here, so -40003 never
/// occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("signature verification failed")]
    ValidateSignature,
    #[error("malformed callback xml")]
    ParseXml,
    #[error("EncodingAESKey is invalid")]
    IllegalAesKey,
    #[error("receive id does not match corp id")]
    ValidateCorpid,
    #[error("aes encryption failed")]
    EncryptAes,
    #[error("aes decryption failed")]
    DecryptAes,
    #[error("decrypted buffer is malformed")]
    IllegalBuffer,
}

impl CryptoError {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::ValidateSignature => -40001,
            Self::ParseXml => -40002,
            Self::IllegalAesKey => -40004,
            Self::ValidateCorpid => -40005,
            Self::EncryptAes => -40006,
            Self::DecryptAes => -40007,
            Self::IllegalBuffer => -40008,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("malformed WeCom message: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("WeCom API error {errcode}: {errmsg}")]
    Api { errcode: i64, errmsg: String },

    #[error("invalid WeCom configuration: {message}")]
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
