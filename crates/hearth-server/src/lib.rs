//! Hearth chat relay server.
//!
//! Clients connect over TCP, register a username with their first line, join
//! named rooms and chat. Each room's leader is its earliest-registered
//! member.
//!
//! # Architecture
//!
//! [`ServerDriver`] holds all state (registry, room directory, leader cache)
//! and is pure: events in, actions out. [`Server`] is the production runtime:
//! a single event loop on Tokio's current-thread scheduler waits on the
//! listener, the per-connection reader tasks and a periodic tick, and hands
//! each event to the driver in turn. No dispatch ever overlaps another, so
//! the state needs no locks.
//!
//! # Components
//!
//! - [`ServerDriver`]: action-based orchestrator (pure logic, no I/O)
//! - [`ConnectionRegistry`]: connection → session
//! - [`RoomDirectory`]: room → members, join and leave
//! - [`LeaderElection`]: per-room leader cache
//! - [`Fanout`] and [`execute_actions`]: delivery, evicting peers whose
//!   writes fail
//! - [`TcpTransport`] and [`TcpPeers`]: listener and per-connection I/O tasks
//! - [`SystemEnv`]: production environment (real clocks)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod executor;
mod fanout;
mod leader;
mod registry;
mod room_directory;
mod server_error;
mod system_env;
mod transport;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

pub use driver::{
    DEFAULT_WELCOME_BANNER, DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent, replies,
};
pub use error::ServerError;
pub use executor::{ExecutionReport, execute_actions};
pub use fanout::{Fanout, FanoutOutcome, LineSink};
use hearth_core::ConnectionId;
pub use leader::{Leader, LeaderChange, LeaderElection};
pub use registry::{ConnectionRegistry, RegistryError, Session};
pub use room_directory::{JoinResult, LeaveResult, RoomDirectory, RoomError, RoomName};
pub use server_error::{DeliveryError, DriverError};
pub use system_env::SystemEnv;
use tokio::{sync::mpsc, time::MissedTickBehavior};
pub use transport::{TcpPeers, TcpTransport};

/// Port the relay listens on by default.
pub const DEFAULT_PORT: u16 = 7777;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:7777")
    pub bind_address: String,
    /// How often the event loop wakes up with nothing else to do, to notice a
    /// shutdown request
    pub poll_interval: Duration,
    /// Maximum bytes read from a socket at once
    pub read_buffer_size: usize,
    /// Capacity of the queue between reader tasks and the event loop
    pub event_queue_depth: usize,
    /// Lines that may wait for one slow peer before it is evicted
    pub outbound_queue_depth: usize,
    /// Driver configuration (limits, banner)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            poll_interval: Duration::from_secs(1),
            read_buffer_size: 1024,
            event_queue_depth: 1024,
            outbound_queue_depth: 256,
            driver: DriverConfig::default(),
        }
    }
}

/// Requests a graceful stop of a running [`Server`].
///
/// The event loop checks the flag on every tick, so a stop takes effect
/// within one poll interval.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// A handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the server to stop.
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Production Hearth server.
///
/// Wraps `ServerDriver` with the TCP transport and the system environment.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver<SystemEnv>,
    /// Listening socket
    transport: TcpTransport,
    /// Runtime configuration
    config: ServerRuntimeConfig,
    /// Stop flag
    shutdown: ShutdownHandle,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let driver = ServerDriver::new(SystemEnv::new(), config.driver.clone());
        let transport = TcpTransport::bind(&config.bind_address).await?;

        Ok(Self { driver, transport, config, shutdown: ShutdownHandle::new() })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Handle that stops [`Self::run`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run the event loop until shutdown is requested or accepting fails.
    ///
    /// Must be polled from within a Tokio runtime; the connection tasks are
    /// spawned onto it.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self { mut driver, transport, config, shutdown } = self;
        tracing::info!("Server starting on {}", transport.local_addr()?);

        let (events_tx, mut events_rx) = mpsc::channel(config.event_queue_depth);
        let mut peers = TcpPeers::new();
        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_connection = 1u64;

        let result = loop {
            tokio::select! {
                accepted = transport.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => break Err(e),
                    };
                    let connection = ConnectionId::new(next_connection);
                    next_connection += 1;

                    tracing::debug!(%connection, %addr, "New TCP connection");
                    peers.attach(
                        connection,
                        stream,
                        events_tx.clone(),
                        config.read_buffer_size,
                        config.outbound_queue_depth,
                    );
                    dispatch(&mut driver, &mut peers, ServerEvent::ConnectionAccepted { connection });
                },
                Some(event) = events_rx.recv() => {
                    dispatch(&mut driver, &mut peers, event);
                },
                _ = ticker.tick() => {
                    if shutdown.is_shutdown() {
                        tracing::info!("Shutdown requested");
                        break Ok(());
                    }
                },
            }
        };

        peers.close_all("server shutting down");
        tracing::info!(?driver, "Server stopped");
        result
    }
}

/// Hand one event to the driver and execute what it returns.
fn dispatch(driver: &mut ServerDriver<SystemEnv>, peers: &mut TcpPeers, event: ServerEvent) {
    match driver.process_event(event) {
        Ok(actions) => {
            let report = execute_actions(driver, actions, peers);
            if !report.evicted.is_empty() {
                tracing::debug!(evicted = ?report.evicted, "evicted peers after failed writes");
            }
            if !report.closed.is_empty() {
                tracing::trace!(closed = ?report.closed, delivered = report.delivered, "closed connections");
            }
        },
        Err(e) => tracing::debug!(error = %e, "dropped event"),
    }
}
