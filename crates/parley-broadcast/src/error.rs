//! Error types for the broadcast layer.

/// Errors that can occur when publishing.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The fan-out task has stopped; nothing can be published anymore.
    #[error("broadcaster has shut down")]
    Closed,
}
