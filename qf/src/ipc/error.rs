//! Command channel error types

use std::time::Duration;
use thiserror::Error;

/// Errors a controller can see when talking to an instance
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("No response from instance within {0:?}")]
    Timeout(Duration),

    #[error("Instance wrote an empty response")]
    EmptyResponse,

    #[error("Empty command")]
    EmptyCommand,

    #[error("Channel IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Whether the instance is most likely not running
    pub fn is_offline(&self) -> bool {
        matches!(self, ChannelError::Timeout(_))
    }
}
