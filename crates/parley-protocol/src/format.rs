//! The text the server writes to clients.
//!
//! Clients are dumb pipes, so these strings are the whole user
//! interface. Every line is terminated by the transport, not here.

use std::fmt;

/// Payload of the public message published when a session comes online.
pub const JOIN_TEXT: &str = "is online";

/// Payload of the public message published when a session leaves.
pub const LEAVE_TEXT: &str = "went offline";

const LISTING_TITLE: &str = "online users:";
const LISTING_EMPTY: &str = "no one else is online";

/// Formats a delivered public or private message: `[sender]: payload`.
pub fn chat_line(sender: &str, payload: &str) -> String {
    format!("[{sender}]: {payload}")
}

/// Formats the reply to `ls`.
///
/// No names gives a fixed notice; otherwise a title line followed by one
/// `[name]` line per user.
pub fn listing(names: &[String]) -> String {
    if names.is_empty() {
        return LISTING_EMPTY.to_string();
    }
    let mut out = String::from(LISTING_TITLE);
    for name in names {
        out.push('\n');
        out.push('[');
        out.push_str(name);
        out.push(']');
    }
    out
}

/// Payload of the system announcement for a heartbeat eviction.
pub fn eviction_announcement(name: &str) -> String {
    format!("{name} timed out and was disconnected")
}

/// A plain notice sent to a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice<'a> {
    /// A private message named a user who is not online.
    UnknownTarget,
    /// A rename asked for a name someone else is using.
    NameTaken,
    /// A rename asked for an unusable name.
    InvalidName,
    /// A rename succeeded.
    Renamed(&'a str),
    /// The session is being evicted for inactivity.
    TimedOut,
    /// An inbound line exceeded the length limit and was dropped.
    LineTooLong,
}

impl fmt::Display for Notice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTarget => write!(f, "target user does not exist"),
            Self::NameTaken => write!(f, "name already taken"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::Renamed(name) => write!(f, "you are now known as {name}"),
            Self::TimedOut => {
                write!(f, "timed out, you have been disconnected")
            }
            Self::LineTooLong => write!(f, "line too long"),
        }
    }
}
