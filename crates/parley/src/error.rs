//! Unified error type for the Parley server.

use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error for the failures that escape a connection handler or
/// the server builder.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically. Protocol and broadcast
/// failures never get this far: they become notices or log lines where
/// they happen.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session-level error (name taken, queue closed).
    #[error(transparent)]
    Session(#[from] SessionError),
}
