//! File-based command channel between a controller and a running instance
//!
//! Each instance owns `<channel-dir>/<account>/`. The controller drops a
//! command token into `command`; the instance consumes it on its next poll
//! and answers in `response`. Both files are single-slot mailboxes: a new
//! write replaces whatever was unread.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod channel;
pub mod client;
pub mod error;
pub mod handler;
pub mod messages;

pub use channel::CommandChannel;
pub use client::ChannelClient;
pub use error::ChannelError;
pub use handler::{HandlerContext, handle_command};
pub use messages::{COMMAND_VOCABULARY, ChannelCommand};

const COMMAND_FILE: &str = "command";
const RESPONSE_FILE: &str = "response";

/// Path of the command mailbox in an account directory
pub fn command_path(account_dir: &Path) -> PathBuf {
    account_dir.join(COMMAND_FILE)
}

/// Path of the response mailbox in an account directory
pub fn response_path(account_dir: &Path) -> PathBuf {
    account_dir.join(RESPONSE_FILE)
}

/// Write `contents` to `path` via a sibling temp file and rename
///
/// Readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
