//! Session types: the server's record of one connected client.
//!
//! A session tracks:
//! - WHO the client is (connection id, remote address, display name)
//! - WHAT lifecycle state it is in
//! - WHERE its outgoing lines go (a bounded per-session queue)
//! - WHEN it last did something (for the heartbeat watchdog)
//!
//! Sessions are shared as `Arc<Session>` between the registry, the
//! broadcaster, and the session's own tasks. Nothing in here is mutated
//! through `&mut`; every field is either immutable or internally
//! synchronized.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use parley_transport::ConnectionId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a session may stay silent before the watchdog evicts it.
    ///
    /// Default: 10 seconds.
    pub heartbeat_timeout: Duration,

    /// Capacity of each session's outbound queue, in lines.
    ///
    /// Direct deliveries (private messages, command replies) wait for
    /// room when the queue is full; broadcast fan-out drops the line for
    /// that recipient instead. Default: 64.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(10),
            outbound_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// ```text
/// Connecting ──(register)──→ Online ──(unregister)──→ Disconnecting ──(teardown done)──→ Closed
/// ```
///
/// A session's name is a key in the registry exactly while it is
/// `Online`. Both edges touching `Online` are taken under the registry's
/// write lock, which is what keeps that true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionState {
    /// Accepted, not yet registered.
    Connecting = 0,
    /// Registered and routable.
    Online = 1,
    /// Removed from the registry; tasks are winding down.
    Disconnecting = 2,
    /// All tasks have exited and the connection is closed. Terminal.
    Closed = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Online,
            2 => Self::Disconnecting,
            _ => Self::Closed,
        }
    }

    /// Returns `true` if the session is registered and routable.
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Online => write!(f, "Online"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Why a session left the `Online` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The client closed the connection.
    EndOfStream,
    /// Reading from the socket failed.
    ReadFailed,
    /// Writing to the socket failed.
    WriteFailed,
    /// No inbound activity for the heartbeat timeout.
    TimedOut,
    /// Forced out by an external request.
    Kicked,
    /// The server is shutting down.
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream => write!(f, "end of stream"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::TimedOut => write!(f, "heartbeat timeout"),
            Self::Kicked => write!(f, "kicked"),
            Self::ServerShutdown => write!(f, "server shutdown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected client.
pub struct Session {
    id: ConnectionId,
    remote_addr: SocketAddr,
    /// Written only while the registry's write lock is held.
    name: RwLock<String>,
    state: AtomicU8,
    reason: OnceLock<DisconnectReason>,
    /// `None` once the queue has been closed for teardown.
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    cancel: CancellationToken,
    started: Instant,
    /// Nanoseconds after `started` of the last processed inbound line.
    last_active: AtomicU64,
}

impl Session {
    /// Creates a session in the `Connecting` state, named after its
    /// remote address.
    ///
    /// Returns the shared session and the receiving end of its outbound
    /// queue, which belongs to the session's writer task alone.
    pub fn new(
        id: ConnectionId,
        remote_addr: SocketAddr,
        config: &SessionConfig,
    ) -> (std::sync::Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
        let session = Self {
            id,
            remote_addr,
            name: RwLock::new(remote_addr.to_string()),
            state: AtomicU8::new(SessionState::Connecting as u8),
            reason: OnceLock::new(),
            outbound: Mutex::new(Some(tx)),
            cancel: CancellationToken::new(),
            started: Instant::now(),
            last_active: AtomicU64::new(0),
        };
        (std::sync::Arc::new(session), rx)
    }

    /// Returns the session's unique id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address recorded at accept time.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns the current display name.
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `from → to` if the session is currently in `from`.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(
                from as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Records why the session left `Online`. Only the first reason sticks.
    pub(crate) fn set_reason(&self, reason: DisconnectReason) {
        let _ = self.reason.set(reason);
    }

    /// Returns why the session disconnected, once it has.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.reason.get().copied()
    }

    /// Marks teardown as finished: `Disconnecting → Closed`.
    ///
    /// Returns `false` if the session was not disconnecting.
    pub fn mark_closed(&self) -> bool {
        self.transition(SessionState::Disconnecting, SessionState::Closed)
    }

    // -- Cancellation ------------------------------------------------------

    /// Returns a clone of the token cancelled when the session starts
    /// disconnecting. The reader, writer, and watchdog all select on it.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns `true` once disconnection has begun.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    // -- Heartbeat ---------------------------------------------------------

    /// Records inbound activity now.
    pub fn touch(&self) {
        let nanos = self.started.elapsed().as_nanos();
        self.last_active
            .store(u64::try_from(nanos).unwrap_or(u64::MAX), Ordering::Release);
    }

    /// Returns the instant of the last recorded activity (session creation
    /// if there has been none).
    pub fn last_active(&self) -> Instant {
        let nanos = self.last_active.load(Ordering::Acquire);
        self.started + Duration::from_nanos(nanos)
    }

    /// Returns how long the session has been silent.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_active())
    }

    // -- Outbound queue ----------------------------------------------------

    /// Queues a line for this client, waiting for room if the queue is
    /// full.
    ///
    /// Used for private messages and command replies, where the waiting
    /// is the backpressure on the sender.
    pub async fn deliver(&self, line: String) -> Result<(), SessionError> {
        let tx = self
            .lock_outbound()
            .clone()
            .ok_or(SessionError::Closed(self.id))?;
        tx.send(line).await.map_err(|_| SessionError::Closed(self.id))
    }

    /// Queues a line without waiting.
    ///
    /// Used by broadcast fan-out so one slow client cannot hold up the
    /// rest: a full queue drops the line for this recipient only.
    pub fn offer(&self, line: String) -> Result<(), SessionError> {
        let guard = self.lock_outbound();
        let tx = guard.as_ref().ok_or(SessionError::Closed(self.id))?;
        tx.try_send(line).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                SessionError::OutboundFull(self.id)
            }
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed(self.id),
        })
    }

    /// Closes the outbound queue.
    ///
    /// Lines already queued stay readable; the writer sees the end of the
    /// queue once it has drained them and every in-flight
    /// [`deliver`](Self::deliver) has finished.
    pub fn close_outbound(&self) {
        self.lock_outbound().take();
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::Sender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(capacity: usize) -> (std::sync::Arc<Session>, mpsc::Receiver<String>) {
        let config = SessionConfig {
            outbound_capacity: capacity,
            ..SessionConfig::default()
        };
        Session::new(
            ConnectionId::new(1),
            "127.0.0.1:40000".parse().unwrap(),
            &config,
        )
    }

    #[test]
    fn test_new_session_is_connecting_and_named_after_address() {
        let (session, _rx) = new_session(4);
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.name(), "127.0.0.1:40000");
        assert_eq!(session.remote_addr().port(), 40000);
        assert!(session.disconnect_reason().is_none());
        assert!(!session.is_cancelled());
    }

    #[test]
    fn test_transition_only_from_expected_state() {
        let (session, _rx) = new_session(4);
        assert!(!session.transition(SessionState::Online, SessionState::Disconnecting));
        assert!(session.transition(SessionState::Connecting, SessionState::Online));
        assert!(session.state().is_online());
        assert!(!session.mark_closed());
        assert!(session.transition(SessionState::Online, SessionState::Disconnecting));
        assert!(session.mark_closed());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_set_reason_keeps_first() {
        let (session, _rx) = new_session(4);
        session.set_reason(DisconnectReason::TimedOut);
        session.set_reason(DisconnectReason::EndOfStream);
        assert_eq!(session.disconnect_reason(), Some(DisconnectReason::TimedOut));
    }

    #[tokio::test]
    async fn test_deliver_and_offer_reach_receiver_in_order() {
        let (session, mut rx) = new_session(4);
        session.deliver("one".into()).await.unwrap();
        session.offer("two".into()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));
    }

    #[test]
    fn test_offer_full_queue_drops() {
        let (session, _rx) = new_session(1);
        session.offer("first".into()).unwrap();
        let err = session.offer("second".into()).unwrap_err();
        assert!(matches!(err, SessionError::OutboundFull(_)));
    }

    #[tokio::test]
    async fn test_close_outbound_drains_then_ends() {
        let (session, mut rx) = new_session(4);
        session.offer("queued".into()).unwrap();
        session.close_outbound();

        assert!(matches!(
            session.offer("late".into()),
            Err(SessionError::Closed(_))
        ));
        assert!(matches!(
            session.deliver("late".into()).await,
            Err(SessionError::Closed(_))
        ));
        assert_eq!(rx.recv().await.as_deref(), Some("queued"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_idle_time() {
        let (session, _rx) = new_session(4);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(session.idle_for(), Duration::from_secs(3));

        session.touch();
        assert_eq!(session.idle_for(), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(session.idle_for(), Duration::from_millis(500));
    }
}
