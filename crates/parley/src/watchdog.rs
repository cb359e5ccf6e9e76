//! Heartbeat watchdog: evicts a session that stays silent too long.

use std::sync::Arc;

use parley_broadcast::{ChatMessage, Origin};
use parley_protocol::{Notice, eviction_announcement};
use parley_session::{DisconnectReason, Session};

use crate::handler::publish;
use crate::server::ServerState;

/// Sleeps until the session's activity deadline, re-arming whenever the
/// reader has touched it in the meantime.
///
/// Returns once the session is cancelled or has been evicted.
pub(crate) async fn run(session: Arc<Session>, state: Arc<ServerState>) {
    let timeout = state.session_config.heartbeat_timeout;
    let cancel = session.cancellation();

    loop {
        let deadline = session.last_active() + timeout;
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = cancel.cancelled() => return,
        }

        if session.idle_for() >= timeout {
            evict(&session, &state).await;
            return;
        }
    }
}

async fn evict(session: &Arc<Session>, state: &ServerState) {
    // Losing this race means the session is already on its way out.
    if !state.registry.unregister(session, DisconnectReason::TimedOut) {
        return;
    }

    let name = session.name();
    tracing::info!(session_id = %session.id(), %name, "heartbeat timeout, evicting");

    // Teardown joins this task before closing the queue, so the notice
    // is flushed ahead of the socket close.
    if let Err(e) = session.offer(Notice::TimedOut.to_string()) {
        tracing::debug!(session_id = %session.id(), error = %e, "timeout notice dropped");
    }
    let announcement =
        ChatMessage::announcement(Origin::System, eviction_announcement(&name));
    publish(state, announcement).await;
}
