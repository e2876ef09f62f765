//! WebSocket transport using `tokio-tungstenite`.
//!
//! [`WebSocketListener::accept`] only takes the TCP connection; the
//! WebSocket upgrade happens in [`Incoming::upgrade`], on the connection's
//! own task, so one slow client can't stall the accept loop.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting or upgrading a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

/// Opaque identifier for a connection, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listens for incoming WebSocket clients.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds to `addr`. Port 0 picks a free port; see
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::BindFailed)
    }

    /// Waits for the next TCP connection. Cancel safe.
    pub async fn accept(&self) -> Result<Incoming, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(Incoming { stream, addr })
    }
}

/// A TCP connection that has not completed the WebSocket upgrade yet.
pub struct Incoming {
    stream: TcpStream,
    addr: SocketAddr,
}

impl Incoming {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Performs the WebSocket upgrade, giving up after `timeout`.
    pub async fn upgrade(self, timeout: Duration) -> Result<WebSocketConnection, TransportError> {
        let ws = match tokio::time::timeout(timeout, tokio_tungstenite::accept_async(self.stream)).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => {
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "WebSocket upgrade timed out",
                )));
            }
        };

        let id = ConnectionId::next();
        debug!(%id, addr = %self.addr, "accepted WebSocket connection");
        Ok(WebSocketConnection {
            id,
            addr: self.addr,
            ws,
        })
    }
}

/// An upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    addr: SocketAddr,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Splits the connection so one task can write while another reads.
    pub fn split(self) -> (FrameSink, FrameStream) {
        let (sink, stream) = self.ws.split();
        (
            FrameSink { id: self.id, sink },
            FrameStream {
                id: self.id,
                stream,
            },
        )
    }
}

/// The sending half of a [`WebSocketConnection`].
pub struct FrameSink {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl FrameSink {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one binary frame.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    /// Sends a close frame and flushes.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }
}

/// The receiving half of a [`WebSocketConnection`].
pub struct FrameStream {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl FrameStream {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Receives the next data frame, text or binary.
    ///
    /// Returns `Ok(None)` when the peer closes the connection. Cancel safe.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}
