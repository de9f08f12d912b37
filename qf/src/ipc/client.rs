//! Controller side of the command channel
//!
//! Drops a command into an instance's mailbox and polls for the answer. An
//! instance that is not running simply never answers, so every request is
//! bounded by a timeout.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::error::ChannelError;
use super::{command_path, response_path, write_atomic};

/// Default time to wait for a response
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default interval between response checks
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Client for one instance's command channel
#[derive(Debug, Clone)]
pub struct ChannelClient {
    account_dir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl ChannelClient {
    /// Client for the instance whose channel lives in `account_dir`
    pub fn new(account_dir: impl Into<PathBuf>) -> Self {
        Self {
            account_dir: account_dir.into(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn account_dir(&self) -> &Path {
        &self.account_dir
    }

    /// Send a command token and wait for the response text
    pub async fn send(&self, token: &str) -> Result<String, ChannelError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ChannelError::EmptyCommand);
        }
        debug!(account_dir = %self.account_dir.display(), %token, "ChannelClient::send: called");

        let response_file = response_path(&self.account_dir);
        remove_if_present(&response_file).await?;

        write_atomic(&command_path(&self.account_dir), &format!("{}\n", token))?;

        let response = tokio::time::timeout(self.timeout, self.wait_for_response(&response_file))
            .await
            .map_err(|_| ChannelError::Timeout(self.timeout))??;

        debug!(bytes = response.len(), "ChannelClient::send: received response");
        if response.trim().is_empty() {
            return Err(ChannelError::EmptyResponse);
        }
        Ok(response)
    }

    async fn wait_for_response(&self, path: &Path) -> Result<String, ChannelError> {
        loop {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    remove_if_present(path).await?;
                    return Ok(text);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<(), ChannelError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
