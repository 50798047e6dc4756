//! IPC error types

use thiserror::Error;

/// IPC error types
#[derive(Debug, Error)]
pub enum IpcError {
    /// Socket pair creation failed
    #[error("Channel creation failed: {0}")]
    ChannelCreation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// IO error on an endpoint
    #[error("IO error: {0}")]
    Io(String),

    /// The channel was closed without carrying any bytes
    #[error("No data received from result channel")]
    NoData,
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::Io(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            // Anything wrong with the incoming bytes is a decode failure;
            // serializing our own types never produces these categories.
            IpcError::Deserialization(err.to_string())
        } else {
            IpcError::Serialization(err.to_string())
        }
    }
}
