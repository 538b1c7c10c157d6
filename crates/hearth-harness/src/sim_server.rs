//! Simulated server.
//!
//! A [`ServerDriver`] wired to a [`SimTransport`] and a [`SimEnv`]. Every
//! call feeds one event to the driver and executes the resulting actions to
//! completion, the same way the production event loop does, so tests observe
//! exactly what clients would receive.

use std::time::Duration;

use bytes::Bytes;
use hearth_core::{ConnectionId, ConnectionState};
use hearth_proto::ServerLine;
use hearth_server::{
    DriverConfig, DriverError, ExecutionReport, ServerDriver, ServerEvent, execute_actions,
};

use crate::{sim_env::SimEnv, sim_transport::SimTransport};

/// Deterministic in-process relay.
pub struct SimServer {
    driver: ServerDriver<SimEnv>,
    transport: SimTransport,
    env: SimEnv,
    next_connection: u64,
}

impl SimServer {
    /// Relay with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SimEnv::new(), DriverConfig::default())
    }

    /// Relay over `env` with `config`.
    pub fn with_config(env: SimEnv, config: DriverConfig) -> Self {
        Self {
            driver: ServerDriver::new(env.clone(), config),
            transport: SimTransport::new(),
            env,
            next_connection: 1,
        }
    }

    /// Open a new connection. Nothing is sent yet.
    pub fn connect(&mut self) -> ConnectionId {
        let connection = ConnectionId::new(self.next_connection);
        self.next_connection += 1;

        self.transport.open(connection);
        let accepted = self.apply(ServerEvent::ConnectionAccepted { connection });
        debug_assert!(accepted.is_ok(), "fresh connection {connection} was rejected: {accepted:?}");
        connection
    }

    /// Open a connection and register `username` on it.
    pub fn login(&mut self, username: &str) -> ConnectionId {
        let connection = self.connect();
        let registered = self.send(connection, username);
        debug_assert!(registered.is_ok(), "login of {username:?} failed: {registered:?}");
        connection
    }

    /// Send one line from `connection`. The terminator is appended.
    pub fn send(&mut self, connection: ConnectionId, line: &str) -> Result<ExecutionReport, DriverError> {
        self.send_bytes(connection, format!("{line}\n").as_bytes())
    }

    /// Send raw bytes from `connection`, split however the test likes.
    pub fn send_bytes(
        &mut self,
        connection: ConnectionId,
        bytes: &[u8],
    ) -> Result<ExecutionReport, DriverError> {
        self.apply(ServerEvent::BytesReceived { connection, bytes: Bytes::copy_from_slice(bytes) })
    }

    /// The peer closes its end.
    pub fn hang_up(&mut self, connection: ConnectionId) -> Result<ExecutionReport, DriverError> {
        let reason = "peer closed the connection".to_string();
        self.apply(ServerEvent::ConnectionClosed { connection, reason })
    }

    /// Make every later write to `connection` fail.
    pub fn break_writes(&mut self, connection: ConnectionId) {
        self.transport.break_writes(connection);
    }

    /// Drain what `connection` received, parsed.
    pub fn take_lines(&mut self, connection: ConnectionId) -> Vec<ServerLine> {
        self.take_raw_lines(connection).iter().map(|line| ServerLine::parse(line)).collect()
    }

    /// Drain what `connection` received, as text.
    pub fn take_raw_lines(&mut self, connection: ConnectionId) -> Vec<String> {
        self.transport.take_lines(connection)
    }

    /// Whether the server closed `connection`.
    pub fn is_closed(&self, connection: ConnectionId) -> bool {
        self.transport.is_closed(connection)
    }

    /// Lifecycle state of `connection` as the driver sees it.
    pub fn connection_state(&self, connection: ConnectionId) -> Option<ConnectionState> {
        self.driver.connection_state(connection)
    }

    /// Move simulated time forward.
    pub fn advance(&self, by: Duration) {
        self.env.advance(by);
    }

    /// The driver under test.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// The in-memory transport.
    pub fn transport(&self) -> &SimTransport {
        &self.transport
    }

    fn apply(&mut self, event: ServerEvent) -> Result<ExecutionReport, DriverError> {
        tracing::trace!(?event, "sim event");
        let actions = self.driver.process_event(event)?;
        Ok(execute_actions(&mut self.driver, actions, &mut self.transport))
    }
}

impl Default for SimServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_sequential() {
        let mut server = SimServer::new();
        assert_eq!(server.connect().get(), 1);
        assert_eq!(server.connect().get(), 2);
        assert_eq!(server.driver().connection_count(), 2);
    }

    #[test]
    fn login_registers_and_welcomes() {
        let mut server = SimServer::new();
        let alice = server.login("alice");

        assert_eq!(server.take_raw_lines(alice), vec!["Welcome to the chat server!"]);
        assert_eq!(server.connection_state(alice), Some(ConnectionState::Lobby));
    }

    #[test]
    fn unknown_connection_is_an_error() {
        let mut server = SimServer::new();
        let result = server.send(ConnectionId::new(42), "hi");
        assert_eq!(result.unwrap_err(), DriverError::ConnectionNotFound(ConnectionId::new(42)));
    }

    #[test]
    fn connection_limit_closes_the_newcomer() {
        let config = DriverConfig { max_connections: 1, ..DriverConfig::default() };
        let mut server = SimServer::with_config(SimEnv::new(), config);

        let first = server.connect();
        let second = server.connect();

        assert!(!server.is_closed(first));
        assert!(server.is_closed(second));
        assert_eq!(server.transport().close_reason(second), Some("max connections exceeded"));
    }
}
