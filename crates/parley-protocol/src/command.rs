//! Control commands carried inside public payloads.

use crate::ProtocolError;

/// Longest display name a client may choose.
pub const MAX_NAME_LEN: usize = 64;

const RENAME_PREFIX: &str = "rename ";

/// A control command handled by the sender's own session instead of
/// being broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ls`: list the other online users.
    List,
    /// `rename <name>`: change the sender's display name.
    Rename(String),
}

impl Command {
    /// Recognizes a command in a (trimmed) public payload.
    ///
    /// Returns `None` for ordinary chat text. `rename` with nothing after
    /// it is not a command and is broadcast like any other text. The new
    /// name is returned as typed; checking it is [`validate_name`]'s job.
    pub fn parse(payload: &str) -> Option<Self> {
        if payload == "ls" {
            return Some(Self::List);
        }
        let name = payload.strip_prefix(RENAME_PREFIX)?.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::Rename(name.to_string()))
    }
}

/// Checks that `name` can be used as a display name.
///
/// # Errors
/// [`ProtocolError::InvalidName`] if the name is empty, longer than
/// [`MAX_NAME_LEN`] bytes, or contains whitespace.
pub fn validate_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty()
        || name.len() > MAX_NAME_LEN
        || name.chars().any(char::is_whitespace)
    {
        return Err(ProtocolError::InvalidName(name.to_string()));
    }
    Ok(())
}
