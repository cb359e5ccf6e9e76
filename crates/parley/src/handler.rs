//! Per-connection handler: registration, the three session tasks, and
//! teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the session under its remote address → Online
//!   2. Announce the join, then spawn reader, writer, and watchdog
//!   3. Wait for the session's cancellation token
//!   4. Tear down exactly once: join tasks, announce the leave, flush, close

use std::sync::Arc;

use parley_broadcast::{ChatMessage, Origin};
use parley_protocol::{
    Command, JOIN_TEXT, LEAVE_TEXT, MessageKind, Notice, ProtocolError,
    chat_line, classify, listing,
};
use parley_session::{DisconnectReason, Session, SessionError};
use parley_transport::{LineReader, LineWriter, TcpConnection, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::watchdog;
use crate::ParleyError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), ParleyError> {
    let conn_id = conn.id();
    let (session, outbound) =
        Session::new(conn_id, conn.peer_addr(), &state.session_config);
    let (reader, writer) = conn.into_split();

    let name = state.registry.register(&session)?;
    if state.shutdown.is_cancelled() {
        tracing::debug!(%conn_id, "connection accepted during shutdown");
        state
            .registry
            .unregister(&session, DisconnectReason::ServerShutdown);
        session.close_outbound();
        session.mark_closed();
        return Ok(());
    }
    session.touch();
    tracing::info!(%conn_id, peer = %session.remote_addr(), %name, "session online");

    announce(&state, &session, JOIN_TEXT).await;

    let writer_task = tokio::spawn(run_writer(
        Arc::clone(&session),
        Arc::clone(&state),
        writer,
        outbound,
    ));
    let reader_task =
        tokio::spawn(run_reader(Arc::clone(&session), Arc::clone(&state), reader));
    let watchdog_task =
        tokio::spawn(watchdog::run(Arc::clone(&session), Arc::clone(&state)));

    session.cancellation().cancelled().await;
    teardown(&session, &state, reader_task, watchdog_task, writer_task).await;
    Ok(())
}

/// Publishes the public notice for a join or leave plus its audit twin.
async fn announce(state: &ServerState, session: &Arc<Session>, text: &str) {
    let message = ChatMessage::public(Origin::Session(Arc::clone(session)), text);
    publish(state, message.with_kind(MessageKind::SystemAnnouncement)).await;
    publish(state, message).await;
}

pub(crate) async fn publish(state: &ServerState, message: ChatMessage) {
    if let Err(e) = state.broadcaster.publish(message).await {
        tracing::warn!(error = %e, "publish failed");
    }
}

/// Releases everything a session holds. Runs once, after cancellation.
async fn teardown(
    session: &Arc<Session>,
    state: &ServerState,
    reader_task: JoinHandle<()>,
    watchdog_task: JoinHandle<()>,
    mut writer_task: JoinHandle<()>,
) {
    for (task, handle) in [("reader", reader_task), ("watchdog", watchdog_task)] {
        if let Err(e) = handle.await {
            tracing::error!(session_id = %session.id(), task, error = %e, "session task failed");
        }
    }

    announce(state, session, LEAVE_TEXT).await;

    // Whatever is already queued still goes out, within the grace period.
    session.close_outbound();
    if tokio::time::timeout(state.flush_grace, &mut writer_task)
        .await
        .is_err()
    {
        tracing::debug!(session_id = %session.id(), "flush grace elapsed, dropping socket");
        writer_task.abort();
        let _ = writer_task.await;
    }

    session.mark_closed();
    tracing::info!(
        session_id = %session.id(),
        name = %session.name(),
        reason = ?session.disconnect_reason(),
        "session closed"
    );
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Drains the outbound queue onto the socket.
///
/// Once the session is cancelled the writer keeps draining until the queue
/// is closed by teardown; teardown bounds that with the flush grace period.
async fn run_writer<W>(
    session: Arc<Session>,
    state: Arc<ServerState>,
    mut writer: LineWriter<W>,
    mut outbound: mpsc::Receiver<String>,
) where
    W: AsyncWrite + Unpin,
{
    let cancel = session.cancellation();

    loop {
        let line = tokio::select! {
            line = outbound.recv() => line,
            _ = cancel.cancelled() => break,
        };
        let Some(line) = line else { break };
        if let Err(e) = writer.send_line(&line).await {
            tracing::debug!(session_id = %session.id(), error = %e, "write failed");
            state.registry.unregister(&session, DisconnectReason::WriteFailed);
            return;
        }
    }

    while let Some(line) = outbound.recv().await {
        if writer.send_line(&line).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

async fn run_reader<R>(
    session: Arc<Session>,
    state: Arc<ServerState>,
    mut reader: LineReader<R>,
) where
    R: AsyncRead + Unpin,
{
    let cancel = session.cancellation();

    loop {
        let next = tokio::select! {
            next = reader.next_line() => next,
            _ = cancel.cancelled() => return,
        };

        match next {
            Ok(Some(line)) => {
                tokio::select! {
                    _ = handle_line(&session, &state, &line) => {}
                    _ = cancel.cancelled() => return,
                }
            }
            Ok(None) => {
                tracing::debug!(session_id = %session.id(), "connection closed by peer");
                state.registry.unregister(&session, DisconnectReason::EndOfStream);
                return;
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(session_id = %session.id(), error = %e, "dropped inbound line");
                if matches!(e, TransportError::LineTooLong { .. }) {
                    reply(&session, Notice::LineTooLong).await;
                }
            }
            Err(e) => {
                tracing::debug!(session_id = %session.id(), error = %e, "read failed");
                state.registry.unregister(&session, DisconnectReason::ReadFailed);
                return;
            }
        }
    }
}

/// Classifies and dispatches one inbound line.
///
/// Blank lines are dropped without counting as activity; everything else
/// refreshes the heartbeat once handled.
pub(crate) async fn handle_line(session: &Arc<Session>, state: &ServerState, line: &str) {
    let message = match classify(Origin::Session(Arc::clone(session)), line) {
        Ok(message) => message,
        Err(ProtocolError::BlankLine) => return,
        Err(e) => {
            tracing::debug!(session_id = %session.id(), error = %e, "unclassifiable line");
            return;
        }
    };

    match message.kind {
        MessageKind::Private => send_private(session, state, &message).await,
        _ => match Command::parse(&message.payload) {
            Some(Command::List) => {
                let names = state.registry.list_names(session.id());
                deliver(session, listing(&names)).await;
            }
            Some(Command::Rename(name)) => rename(session, state, &name).await,
            None => publish(state, message).await,
        },
    }

    session.touch();
}

async fn send_private(session: &Session, state: &ServerState, message: &ChatMessage) {
    let target = message.target.as_deref().unwrap_or_default();
    let Some(recipient) = state.registry.lookup(target) else {
        reply(session, Notice::UnknownTarget).await;
        return;
    };
    let line = chat_line(&session.name(), &message.payload);
    if let Err(e) = recipient.deliver(line).await {
        tracing::debug!(target, error = %e, "private message not delivered");
    }
}

async fn rename(session: &Session, state: &ServerState, name: &str) {
    match state.registry.rename(session, name) {
        Ok(_) => reply(session, Notice::Renamed(name)).await,
        Err(SessionError::NameTaken(_)) => reply(session, Notice::NameTaken).await,
        Err(SessionError::InvalidName(_)) => reply(session, Notice::InvalidName).await,
        Err(e) => {
            tracing::debug!(session_id = %session.id(), error = %e, "rename ignored");
        }
    }
}

async fn reply(session: &Session, notice: Notice<'_>) {
    deliver(session, notice.to_string()).await;
}

async fn deliver(session: &Session, line: String) {
    if let Err(e) = session.deliver(line).await {
        tracing::debug!(session_id = %session.id(), error = %e, "reply not delivered");
    }
}
