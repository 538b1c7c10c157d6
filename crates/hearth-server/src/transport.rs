//! TCP transport.
//!
//! [`TcpTransport`] owns the listening socket. [`TcpPeers`] owns the I/O tasks
//! of every accepted connection and is the production [`LineSink`].
//!
//! Each stream is split in two. A reader task forwards raw bytes, EOF and
//! read errors to the event loop as [`ServerEvent`]s without interpreting
//! them. A writer task drains the connection's outbound queue. The queue is
//! bounded: a delivery to a peer whose queue is full fails instead of
//! waiting, and the fan-out evicts that peer. When a write fails the writer
//! stops and drops the queue, so the next delivery fails the same way.

use std::{collections::HashMap, net::SocketAddr};

use bytes::{Bytes, BytesMut};
use hearth_core::ConnectionId;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc::{self, error::TrySendError},
    task::AbortHandle,
};

use crate::{driver::ServerEvent, error::ServerError, fanout::LineSink, server_error::DeliveryError};

/// Listening TCP socket.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind to `address` (`host:port`; port 0 picks a free one).
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("TCP transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept the next connection. Cancel-safe.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        self.listener.accept().await.map_err(|e| ServerError::Transport(format!("accept failed: {e}")))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|e| ServerError::Transport(e.to_string()))
    }
}

/// I/O handles of one accepted connection.
struct Peer {
    /// Queue drained by the writer task; closed once the writer gives up
    outbound: mpsc::Sender<Bytes>,
    /// Reader task, aborted on close
    reader: AbortHandle,
}

/// All accepted connections.
#[derive(Default)]
pub struct TcpPeers {
    peers: HashMap<ConnectionId, Peer>,
}

impl TcpPeers {
    /// No connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the reader and writer tasks for `stream`.
    ///
    /// The reader reads at most `read_buffer_size` bytes at a time and sends
    /// what it got to `events`. At most `outbound_queue_depth` lines wait for
    /// the writer; `outbound_queue_depth` must be non-zero.
    pub fn attach(
        &mut self,
        connection: ConnectionId,
        stream: TcpStream,
        events: mpsc::Sender<ServerEvent>,
        read_buffer_size: usize,
        outbound_queue_depth: usize,
    ) {
        let (read_half, write_half) = stream.into_split();
        let (outbound, queue) = mpsc::channel(outbound_queue_depth.max(1));

        let reader = tokio::spawn(read_loop(connection, read_half, events, read_buffer_size));
        tokio::spawn(write_loop(connection, write_half, queue));

        self.peers.insert(connection, Peer { outbound, reader: reader.abort_handle() });
    }

    /// Number of attached connections.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no connection is attached.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Close every connection. Queued lines are still flushed.
    pub fn close_all(&mut self, reason: &str) {
        for (connection, peer) in self.peers.drain() {
            peer.reader.abort();
            tracing::debug!(%connection, reason, "closed connection");
        }
    }
}

impl LineSink for TcpPeers {
    fn send_line(&mut self, connection: ConnectionId, line: &Bytes) -> Result<(), DeliveryError> {
        let peer = self.peers.get(&connection).ok_or(DeliveryError::UnknownConnection(connection))?;
        match peer.outbound.try_send(line.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::debug!(%connection, "outbound queue full");
                Err(DeliveryError::PeerGone(connection))
            },
            Err(TrySendError::Closed(_)) => Err(DeliveryError::PeerGone(connection)),
        }
    }

    fn close(&mut self, connection: ConnectionId, reason: &str) {
        if let Some(peer) = self.peers.remove(&connection) {
            peer.reader.abort();
            tracing::debug!(%connection, reason, "closed connection");
        }
    }
}

async fn read_loop(
    connection: ConnectionId,
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<ServerEvent>,
    read_buffer_size: usize,
) {
    let mut buf = BytesMut::with_capacity(read_buffer_size);

    loop {
        buf.reserve(read_buffer_size);

        let (event, last) = match reader.read_buf(&mut buf).await {
            Ok(0) => {
                let reason = "peer closed the connection".to_string();
                (ServerEvent::ConnectionClosed { connection, reason }, true)
            },
            Ok(_) => (ServerEvent::BytesReceived { connection, bytes: buf.split().freeze() }, false),
            Err(e) => {
                let reason = format!("read error: {e}");
                (ServerEvent::ConnectionClosed { connection, reason }, true)
            },
        };

        if events.send(event).await.is_err() || last {
            break;
        }
    }
}

async fn write_loop(
    connection: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Bytes>,
) {
    while let Some(line) = queue.recv().await {
        if let Err(e) = writer.write_all(&line).await {
            tracing::debug!(%connection, error = %e, "write failed, dropping outbound queue");
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(%connection, error = %e, "shutdown failed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncBufReadExt;

    use super::*;

    #[tokio::test]
    async fn transport_binds_ephemeral_port() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0, "Should have assigned a port");
    }

    #[tokio::test]
    async fn transport_rejects_invalid_address() {
        let result = TcpTransport::bind("invalid:address:format").await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn peers_forward_bytes_and_lines() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = transport.accept().await.unwrap();
        let mut client = client.await.unwrap();

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let mut peers = TcpPeers::new();
        let connection = ConnectionId::new(1);
        peers.attach(connection, stream, events_tx, 64, 8);
        assert_eq!(peers.len(), 1);

        client.write_all(b"alice\n").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event, ServerEvent::BytesReceived { ref bytes, .. } if &bytes[..] == b"alice\n"));

        peers.send_line(connection, &Bytes::from_static(b"SYS 1 hi\n")).unwrap();
        peers.close(connection, "done");
        assert!(peers.is_empty());

        let mut lines = tokio::io::BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("SYS 1 hi"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn peer_eof_becomes_connection_closed() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = transport.accept().await.unwrap();
        drop(client.await.unwrap());

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let mut peers = TcpPeers::new();
        peers.attach(ConnectionId::new(7), stream, events_tx, 64, 8);

        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event, ServerEvent::ConnectionClosed { connection, .. } if connection.get() == 7));
    }

    #[tokio::test]
    async fn peer_that_stops_reading_is_refused_once_its_queue_fills() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = transport.accept().await.unwrap();
        // Connected, never read from.
        let _client = client.await.unwrap();

        let (events_tx, _events_rx) = mpsc::channel(8);
        let mut peers = TcpPeers::new();
        let connection = ConnectionId::new(2);
        peers.attach(connection, stream, events_tx, 64, 2);

        let line = Bytes::from(vec![b'x'; 64 * 1024]);
        let mut accepted = 0;
        let refused = loop {
            if let Err(e) = peers.send_line(connection, &line) {
                break e;
            }
            accepted += 1;
            assert!(accepted < 4096, "slow peer was never refused");
            tokio::task::yield_now().await;
        };

        assert_eq!(refused, DeliveryError::PeerGone(connection));
    }

    #[tokio::test]
    async fn unknown_connection_is_reported() {
        let mut peers = TcpPeers::new();
        let result = peers.send_line(ConnectionId::new(3), &Bytes::from_static(b"x\n"));
        assert_eq!(result, Err(DeliveryError::UnknownConnection(ConnectionId::new(3))));
    }
}
