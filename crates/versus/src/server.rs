//! `VersusServer` builder and accept loop.
//!
//! Ties the layers together: WebSocket transport, JSON codec, the room
//! registry, and the channel gateway that carries room events back out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use versus_protocol::{Codec, JsonCodec};
use versus_room::{ChannelGateway, RoomConfig, RoomRegistry};
use versus_transport::{Transport, WebSocketTransport};

use crate::VersusError;
use crate::handler::handle_connection;

/// Default limit on how long a connection may go without sending any
/// frame, pongs included, before it is closed.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between transport-level pings to each connection.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Shared server state passed to each connection handler task.
///
/// The registry lock is held only to look up or create a room, never
/// while waiting on a room actor.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<RoomRegistry<ChannelGateway>>,
    pub(crate) gateway: Arc<ChannelGateway>,
    pub(crate) codec: C,
    pub(crate) read_timeout: Duration,
    pub(crate) heartbeat_interval: Duration,
}

/// Builder for configuring and starting a Versus server.
///
/// # Example
///
/// ```rust,no_run
/// use versus::prelude::*;
///
/// # async fn start() -> Result<(), VersusError> {
/// let server = VersusServer::builder()
///     .bind("0.0.0.0:3000")
///     .room_config(RoomConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct VersusServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    read_timeout: Duration,
    heartbeat_interval: Duration,
}

impl VersusServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            room_config: RoomConfig::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Sets the address to bind the server to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the timing and payloads every room runs with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Closes connections that send nothing for this long. Pongs to the
    /// server's heartbeat pings count, so a client that only watches stays
    /// connected as long as its WebSocket stack is alive.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// How often every connection is pinged. Should be well below the
    /// read timeout.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Binds the listener and prepares an empty registry.
    pub async fn build(self) -> Result<VersusServer, VersusError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut heartbeat_interval = self.heartbeat_interval;
        if heartbeat_interval.is_zero() {
            tracing::warn!("heartbeat_interval of 0 is unusable, using default");
            heartbeat_interval = DEFAULT_HEARTBEAT_INTERVAL;
        }
        if heartbeat_interval >= self.read_timeout {
            tracing::warn!(
                heartbeat_ms = heartbeat_interval.as_millis() as u64,
                read_timeout_ms = self.read_timeout.as_millis() as u64,
                "heartbeat interval is not below the read timeout, idle clients may be dropped"
            );
        }

        let gateway = Arc::new(ChannelGateway::new());
        let state = Arc::new(ServerState {
            registry: Mutex::new(RoomRegistry::new(Arc::clone(&gateway), self.room_config)),
            gateway,
            codec: JsonCodec,
            read_timeout: self.read_timeout,
            heartbeat_interval,
        });

        Ok(VersusServer { transport, state })
    }
}

impl Default for VersusServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Versus server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct VersusServer {
    transport: WebSocketTransport,
    state: Arc<ServerState<JsonCodec>>,
}

impl VersusServer {
    /// Creates a new builder.
    pub fn builder() -> VersusServerBuilder {
        VersusServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, VersusError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop, spawning one handler task per connection.
    ///
    /// Failed upgrades are logged and skipped. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), VersusError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Versus server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
