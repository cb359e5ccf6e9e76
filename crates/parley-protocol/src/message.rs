//! Message classification.
//!
//! Every non-blank inbound line becomes exactly one [`Message`]:
//!
//! ```text
//! "@bob  see you "  → Private { target: "bob", payload: "see you" }
//! "@bob"            → Public  { payload: "@bob" }
//! "  hello  "       → Public  { payload: "hello" }
//! "   "             → Err(BlankLine)
//! ```
//!
//! Classification is a pure function of the line. Commands (`ls`,
//! `rename`) are ordinary public messages at this level; the session
//! loop recognizes them afterwards with [`Command::parse`](crate::Command::parse).

use std::fmt;

use crate::ProtocolError;

/// How a message is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Delivered to every online session except the sender.
    Public,
    /// Delivered to exactly one named session.
    Private,
    /// An audit/system record. Always logged by the broadcaster; fanned
    /// out to the room only when the system itself is the author.
    SystemAnnouncement,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::SystemAnnouncement => write!(f, "system"),
        }
    }
}

/// A classified chat message.
///
/// `S` is whatever identifies the sender. The server uses a handle to the
/// originating session (or the system pseudo-user); tests use `&str`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<S> {
    /// Who sent it. Read-only for the message's whole life.
    pub sender: S,
    /// User-visible text, without line terminator or `@target` prefix.
    pub payload: String,
    /// Routing class.
    pub kind: MessageKind,
    /// Recipient name; `Some` only for [`MessageKind::Private`].
    pub target: Option<String>,
}

impl<S> Message<S> {
    /// Builds a public message.
    pub fn public(sender: S, payload: impl Into<String>) -> Self {
        Self {
            sender,
            payload: payload.into(),
            kind: MessageKind::Public,
            target: None,
        }
    }

    /// Builds a private message addressed to `target`.
    pub fn private(
        sender: S,
        target: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            payload: payload.into(),
            kind: MessageKind::Private,
            target: Some(target.into()),
        }
    }

    /// Builds a system announcement.
    pub fn announcement(sender: S, payload: impl Into<String>) -> Self {
        Self {
            sender,
            payload: payload.into(),
            kind: MessageKind::SystemAnnouncement,
            target: None,
        }
    }

    /// Returns a copy of this message with a different kind.
    ///
    /// Used for dual delivery: a join notice goes out once as `Public`
    /// and once as a `SystemAnnouncement` audit record. The target only
    /// survives when the new kind is still `Private`.
    pub fn with_kind(&self, kind: MessageKind) -> Self
    where
        S: Clone,
    {
        Self {
            sender: self.sender.clone(),
            payload: self.payload.clone(),
            kind,
            target: match kind {
                MessageKind::Private => self.target.clone(),
                _ => None,
            },
        }
    }
}

/// Classifies one inbound line (terminator already stripped).
///
/// A line is private when it matches `@<target><whitespace><payload>`:
/// a leading `@`, one or more non-whitespace characters, at least one
/// whitespace character, and a payload that is non-empty after trimming.
/// Anything else that isn't blank is public, including a bare `@name`.
///
/// # Errors
/// Returns [`ProtocolError::BlankLine`] for empty or whitespace-only
/// lines.
pub fn classify<S>(sender: S, line: &str) -> Result<Message<S>, ProtocolError> {
    let text = line.trim();
    if text.is_empty() {
        return Err(ProtocolError::BlankLine);
    }

    match split_private(line) {
        Some((target, payload)) => Ok(Message::private(sender, target, payload)),
        None => Ok(Message::public(sender, text)),
    }
}

fn split_private(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('@')?;
    let end = rest.find(char::is_whitespace)?;
    let (target, remainder) = rest.split_at(end);
    if target.is_empty() {
        return None;
    }
    let payload = remainder.trim();
    if payload.is_empty() {
        return None;
    }
    Some((target, payload))
}
