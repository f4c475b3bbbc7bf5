use std::path::PathBuf;

use thiserror::Error;

/// Operational errors. These short-circuit a command and map to exit code 2;
/// anything a user can fix in their sources travels as a [`crate::Failure`]
/// value instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("{}: no such file or directory", .0.display())]
    NotFound(PathBuf),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("corrupt toolchain: {0}")]
    ToolchainCorrupt(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config_invalid(message: impl Into<String>) -> Error {
        Error::ConfigInvalid(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Error {
        Error::Internal(message.into())
    }
}
