//! Message fan-out for Parley.
//!
//! The broadcaster is a single Tokio task (actor model) fed by a bounded
//! mpsc channel. Every session publishes into the same channel, and the
//! task delivers one message at a time, so all recipients see messages
//! in the order they were published.
//!
//! # Key types
//!
//! - [`Broadcaster`]: the fan-out actor
//! - [`BroadcastHandle`]: cheap, cloneable publishing side
//! - [`Origin`] / [`ChatMessage`]: who a message is from
//! - [`BroadcastConfig`]: buffer capacity

mod broadcaster;
mod config;
mod error;

pub use broadcaster::{BroadcastHandle, Broadcaster, ChatMessage, Origin, SYSTEM_NAME};
pub use config::BroadcastConfig;
pub use error::BroadcastError;
