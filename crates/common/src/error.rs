use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unknown stream state: {0}")]
    UnknownState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
