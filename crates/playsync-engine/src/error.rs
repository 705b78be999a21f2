//! Engine error types.

use thiserror::Error;

use crate::transport::BackendKind;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("target address missing")]
    MissingTarget,

    #[error("bad target {0:?}, expected <host>:<port>")]
    BadTarget(String),

    #[error("{0}")]
    Inconsistent(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable { backend: BackendKind, reason: String },

    #[error("no transport backend available ({0})")]
    NoBackend(String),

    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal startup failures. The engine never starts after one of these.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
