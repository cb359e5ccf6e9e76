use std::io;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// A line was longer than the reader allows. The rest of the line
    /// has been discarded; the stream is still usable.
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// A line was not valid UTF-8. The line has been discarded; the
    /// stream is still usable.
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

impl TransportError {
    /// Returns `true` if the stream can keep being read after this error.
    ///
    /// Everything else means the peer is gone or the socket is broken.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LineTooLong { .. } | Self::InvalidUtf8(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_for_line_errors() {
        assert!(TransportError::LineTooLong { max: 8 }.is_transient());
        let bad = std::str::from_utf8(&[0xff]).unwrap_err();
        assert!(TransportError::InvalidUtf8(bad).is_transient());
    }

    #[test]
    fn test_is_transient_false_for_io_errors() {
        let err = TransportError::ReceiveFailed(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(!err.is_transient());
        let err = TransportError::AcceptFailed(io::Error::other("boom"));
        assert!(!err.is_transient());
    }
}
