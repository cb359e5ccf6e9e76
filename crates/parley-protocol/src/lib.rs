//! Line protocol for Parley.
//!
//! This crate is the "language" of the chat room, with no I/O of its own:
//!
//! - **Classification** ([`classify`], [`Message`], [`MessageKind`]):
//!   turning a raw inbound line into a public or private message.
//! - **Commands** ([`Command`]): the `ls` and `rename <name>` control
//!   lines, recognized inside public payloads.
//! - **Formatting** ([`chat_line`], [`listing`], [`Notice`]): the exact
//!   text the server writes back to clients.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Message) → Session / Broadcast (routing)
//! ```
//!
//! [`Message`] is generic over its sender so this crate does not need to
//! know what a session is; the server instantiates it with its own
//! origin type.

mod command;
mod error;
mod format;
mod message;

pub use command::{Command, MAX_NAME_LEN, validate_name};
pub use error::ProtocolError;
pub use format::{
    JOIN_TEXT, LEAVE_TEXT, Notice, chat_line, eviction_announcement, listing,
};
pub use message::{Message, MessageKind, classify};
