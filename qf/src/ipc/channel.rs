//! Instance side of the command channel
//!
//! Called from the tick thread. Never fails: IO problems are logged and the
//! channel carries on with the next poll.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{command_path, response_path, write_atomic};

/// Single-slot command mailbox for one account
#[derive(Debug, Clone)]
pub struct CommandChannel {
    dir: PathBuf,
}

impl CommandChannel {
    /// Channel rooted at the account directory
    pub fn new(account_dir: impl Into<PathBuf>) -> Self {
        let dir = account_dir.into();
        debug!(dir = %dir.display(), "CommandChannel::new: called");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take the pending command, if any
    ///
    /// The file is deleted as soon as it is read so a command is processed at
    /// most once. Blank commands are consumed and ignored. Bytes that are not
    /// UTF-8 are replaced rather than left in the slot.
    pub fn try_consume_command(&self) -> Option<String> {
        let path = command_path(&self.dir);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "CommandChannel: failed to read command");
                return None;
            }
        };

        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "CommandChannel: failed to delete command");
        }

        let content = String::from_utf8_lossy(&bytes);
        let token = content.trim();
        if token.is_empty() {
            debug!("CommandChannel::try_consume_command: blank command ignored");
            return None;
        }

        info!(%token, "CommandChannel: received command");
        Some(token.to_string())
    }

    /// Answer `token`, replacing any unread response
    pub fn respond_to(&self, token: &str, text: &str) {
        let path = response_path(&self.dir);
        match write_atomic(&path, text) {
            Ok(()) => debug!(%token, bytes = text.len(), "CommandChannel::respond_to: written"),
            Err(e) => warn!(%token, path = %path.display(), error = %e, "CommandChannel: failed to write response"),
        }
    }
}
