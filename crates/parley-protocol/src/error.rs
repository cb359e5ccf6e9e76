//! Error types for the protocol layer.
//!
//! These never reach the wire as error codes. The server turns them into
//! plain notice lines (or silently skips the input, for blank lines).

/// Errors that can occur while interpreting an inbound line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line was empty or whitespace only. Blank lines are dropped
    /// before classification and never become a message.
    #[error("blank line")]
    BlankLine,

    /// A requested display name is unusable: empty, too long, or
    /// containing whitespace (which would break `@name` targeting).
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}
