//! Broadcaster actor: one task that owns message fan-out.
//!
//! Publishers hold a [`BroadcastHandle`]; the [`Broadcaster`] drains the
//! channel and, for each message, takes a registry snapshot and pushes
//! the formatted line onto each recipient's outbound queue.

use std::sync::Arc;

use parley_protocol::{Message, MessageKind, chat_line};
use parley_session::{Session, SessionError, SessionRegistry};
use parley_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{BroadcastConfig, BroadcastError};

/// Display name of the system pseudo-user.
pub const SYSTEM_NAME: &str = "system";

/// Who a message is from.
#[derive(Debug, Clone)]
pub enum Origin {
    /// A connected client.
    Session(Arc<Session>),
    /// The server itself (eviction notices and the like).
    System,
}

impl Origin {
    /// Returns the sender's display name at this moment.
    pub fn name(&self) -> String {
        match self {
            Self::Session(session) => session.name(),
            Self::System => SYSTEM_NAME.to_string(),
        }
    }

    /// Returns the originating session's id, if there is one.
    pub fn session_id(&self) -> Option<ConnectionId> {
        match self {
            Self::Session(session) => Some(session.id()),
            Self::System => None,
        }
    }
}

/// A classified message with its origin attached.
pub type ChatMessage = Message<Origin>;

/// Publishing side of the broadcaster.
///
/// Cheap to clone, it is just an `mpsc::Sender` wrapper. Every
/// session task holds one.
#[derive(Clone)]
pub struct BroadcastHandle {
    sender: mpsc::Sender<ChatMessage>,
}

impl BroadcastHandle {
    /// Queues a message for fan-out.
    ///
    /// Returns immediately while the buffer has room and waits otherwise.
    /// Private messages are accepted too and routed to their target only;
    /// the server itself delivers those straight to the recipient's queue,
    /// so this path is for code embedding the broadcaster on its own.
    pub async fn publish(&self, message: ChatMessage) -> Result<(), BroadcastError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| BroadcastError::Closed)
    }
}

/// The fan-out actor. Runs inside its own Tokio task.
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    receiver: mpsc::Receiver<ChatMessage>,
}

impl Broadcaster {
    /// Creates the actor and its handle without starting it.
    pub fn new(
        registry: Arc<SessionRegistry>,
        config: &BroadcastConfig,
    ) -> (Self, BroadcastHandle) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        (Self { registry, receiver }, BroadcastHandle { sender })
    }

    /// Creates the actor and spawns it on the current runtime.
    pub fn spawn(
        registry: Arc<SessionRegistry>,
        config: &BroadcastConfig,
    ) -> (BroadcastHandle, JoinHandle<()>) {
        let (actor, handle) = Self::new(registry, config);
        (handle, tokio::spawn(actor.run()))
    }

    /// Runs the actor loop until every handle has been dropped.
    pub async fn run(mut self) {
        tracing::info!("broadcaster started");

        while let Some(message) = self.receiver.recv().await {
            let delivered = self.dispatch(&message);
            tracing::debug!(
                kind = %message.kind,
                sender = %message.sender.name(),
                delivered,
                "message dispatched"
            );
        }

        tracing::info!("broadcaster stopped");
    }

    /// Delivers one message. Returns how many queues accepted it.
    fn dispatch(&self, message: &ChatMessage) -> usize {
        match message.kind {
            MessageKind::Public => {
                let line = chat_line(&message.sender.name(), &message.payload);
                self.fan_out(&line, message.sender.session_id())
            }
            MessageKind::Private => {
                let Some(target) = message.target.as_deref() else {
                    return 0;
                };
                let Some(recipient) = self.registry.lookup(target) else {
                    tracing::debug!(target, "private target not online");
                    return 0;
                };
                let line = chat_line(&message.sender.name(), &message.payload);
                usize::from(offer(&recipient, line))
            }
            MessageKind::SystemAnnouncement => {
                tracing::info!(
                    sender = %message.sender.name(),
                    payload = %message.payload,
                    "system announcement"
                );
                match message.sender {
                    Origin::System => self.fan_out(&message.payload, None),
                    // A session's announcement is the audit twin of a
                    // public message that already reached the room.
                    Origin::Session(_) => 0,
                }
            }
        }
    }

    fn fan_out(&self, line: &str, exclude: Option<ConnectionId>) -> usize {
        self.registry
            .online()
            .iter()
            .filter(|session| Some(session.id()) != exclude)
            .filter(|session| offer(session, line.to_string()))
            .count()
    }
}

/// Offers a line to one recipient, logging (not propagating) failures.
fn offer(session: &Session, line: String) -> bool {
    match session.offer(line) {
        Ok(()) => true,
        Err(SessionError::OutboundFull(id)) => {
            tracing::warn!(session_id = %id, "outbound queue full, line dropped");
            false
        }
        Err(err) => {
            tracing::debug!(session_id = %session.id(), error = %err, "delivery skipped");
            false
        }
    }
}
