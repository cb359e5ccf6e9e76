//! Error types for the session layer.

use parley_protocol::ProtocolError;
use parley_transport::ConnectionId;

/// Errors that can occur during session and registry operations.
///
/// None of these are faults of the server: the session loop turns the
/// name errors into notices for the client and logs the queue errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Another online session already uses the requested name.
    #[error("name {0:?} is already taken")]
    NameTaken(String),

    /// The requested name failed validation.
    #[error(transparent)]
    InvalidName(#[from] ProtocolError),

    /// The session is not in the state this operation requires
    /// (e.g. renaming a session that is already disconnecting).
    #[error("session {0} is not online")]
    NotOnline(ConnectionId),

    /// The session's outbound queue has been closed.
    #[error("outbound queue of session {0} is closed")]
    Closed(ConnectionId),

    /// The session's outbound queue is full; the line was dropped.
    #[error("outbound queue of session {0} is full")]
    OutboundFull(ConnectionId),
}
