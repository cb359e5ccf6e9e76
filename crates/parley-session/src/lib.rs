//! Chat session management for Parley.
//!
//! This crate owns the identity and lifecycle of every connection:
//!
//! 1. **Sessions**: one per client ([`Session`]): display name, state
//!    machine, outbound queue, cancellation token, heartbeat activity.
//! 2. **Registry**: who is online, by name ([`SessionRegistry`]), with
//!    atomic register / unregister / rename.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)        ← spawns reader / writer / watchdog per session
//! Broadcast (above)     ← fans messages out over registry snapshots
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Transport (below) ← name validation, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{DisconnectReason, Session, SessionConfig, SessionState};
