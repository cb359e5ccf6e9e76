//! `ParleyServer` builder and accept loop.
//!
//! This is the entry point for running a Parley chat server. It ties
//! together all the layers: transport → protocol → session → broadcast.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parley_broadcast::{BroadcastConfig, BroadcastHandle, Broadcaster};
use parley_session::{DisconnectReason, SessionConfig, SessionRegistry};
use parley_transport::{TcpTransport, Transport};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::ParleyError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) broadcaster: BroadcastHandle,
    pub(crate) session_config: SessionConfig,
    pub(crate) flush_grace: Duration,
    /// Cancelled once the accept loop stops.
    pub(crate) shutdown: CancellationToken,
}

impl ServerState {
    /// Creates the registry and spawns the broadcaster on the current runtime.
    ///
    /// The broadcaster runs until the last handle, held here and by every
    /// handler task, is dropped.
    pub(crate) fn start(config: &ServerConfig) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let (broadcaster, _task) =
            Broadcaster::spawn(Arc::clone(&registry), &config.broadcast);
        Arc::new(Self {
            registry,
            broadcaster,
            session_config: config.session.clone(),
            flush_grace: config.flush_grace,
            shutdown: CancellationToken::new(),
        })
    }
}

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,ignore
/// use parley::prelude::*;
///
/// let server = ParleyServer::builder()
///     .bind("0.0.0.0:7080")
///     .heartbeat_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ParleyServerBuilder {
    config: ServerConfig,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Sets the broadcaster configuration.
    pub fn broadcast_config(mut self, config: BroadcastConfig) -> Self {
        self.config.broadcast = config;
        self
    }

    /// Sets how long a session may stay silent before it is evicted.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.config.session.heartbeat_timeout = timeout;
        self
    }

    /// Sets the flush grace period for closing sessions.
    pub fn flush_grace(mut self, grace: Duration) -> Self {
        self.config.flush_grace = grace;
        self
    }

    /// Binds the listener and starts the broadcaster.
    ///
    /// A bind failure is the only error surfaced here.
    pub async fn build(self) -> Result<ParleyServer, ParleyError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        let state = ServerState::start(&self.config);

        Ok(ParleyServer { transport, state })
    }
}

impl Default for ParleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parley chat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParleyServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
}

impl ParleyServer {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the registry of online sessions.
    ///
    /// Useful for operator actions such as
    /// [`SessionRegistry::disconnect_by_name`].
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ParleyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted connection gets its own handler task. Accept errors
    /// are logged and the loop keeps going. On shutdown every online
    /// session is disconnected and the listener is dropped.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), ParleyError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "Parley server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        // Set before the snapshot: a handler that registers after it sees
        // the flag and leaves on its own.
        self.state.shutdown.cancel();
        let online = self.state.registry.online();
        tracing::info!(sessions = online.len(), "shutting down");
        for session in online {
            self.state
                .registry
                .unregister(&session, DisconnectReason::ServerShutdown);
        }
        Ok(())
    }
}
