//! # Parley
//!
//! A single-room chat server over plain TCP.
//!
//! Clients send newline-terminated text. Every line is either a public
//! message to the whole room, a private `@name message`, or one of two
//! commands (`ls`, `rename <name>`). Silent clients are evicted after a
//! heartbeat timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn start() -> Result<(), ParleyError> {
//! let server = ParleyServer::builder()
//!     .bind("127.0.0.1:7080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Then connect with `nc 127.0.0.1 7080`, or `parley client --name alice`.

pub mod cli;
pub mod client;
mod config;
mod error;
mod handler;
mod server;
mod watchdog;

pub use config::{DEFAULT_BIND_ADDR, ServerConfig};
pub use error::ParleyError;
pub use server::{ParleyServer, ParleyServerBuilder};

/// Convenience re-exports for embedding the server.
pub mod prelude {
    pub use crate::{ParleyError, ParleyServer, ParleyServerBuilder, ServerConfig};

    pub use parley_broadcast::BroadcastConfig;
    pub use parley_session::{DisconnectReason, SessionConfig, SessionRegistry};
}
