//! embassy-net glue for the HTTP server.
//!
//! The connection state machine is synchronous: it queues its response into a
//! [`SocketTransport`] and this module drains the queue into the TCP socket,
//! feeding progress back as `on_sent` events. An idle period of
//! [`IDLE_POLL_MS`] in either direction becomes an `on_poll` event.

use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::{Duration, with_timeout};
use heapless::Vec;
use log::{debug, info, warn};

use crate::connection::{BODY_BUF_LEN, HEADER_BUF_LEN, Progress};
use crate::model::NodeContext;
use crate::server::{HttpServer, IDLE_POLL_MS};
use crate::traits::{Listener, Transport, TransportError};

/// Socket RX/TX buffer size the caller should provide.
pub const SOCKET_BUF_LEN: usize = 1536;
const STAGE_LEN: usize = HEADER_BUF_LEN + BODY_BUF_LEN;

/// Response bytes queued by the state machine, plus the close/abort request.
pub struct SocketTransport {
    staged: Vec<u8, STAGE_LEN>,
    flushed: usize,
    close_requested: bool,
    abort_requested: bool,
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTransport {
    pub const fn new() -> Self {
        Self {
            staged: Vec::new(),
            flushed: 0,
            close_requested: false,
            abort_requested: false,
        }
    }

    fn pending(&self) -> &[u8] {
        &self.staged[self.flushed..]
    }

    fn has_pending(&self) -> bool {
        self.flushed < self.staged.len()
    }

    fn advance(&mut self, n: usize) {
        self.flushed = (self.flushed + n).min(self.staged.len());
    }
}

impl Transport for SocketTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.staged
            .extend_from_slice(data)
            .map_err(|_| TransportError::Write)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.close_requested = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.abort_requested = true;
    }
}

/// Listening side of the server on an embassy-net stack.
///
/// embassy-net keeps at most one pending connection per listening socket, so
/// every backlog is served as one.
pub struct StackListener<'d> {
    stack: Stack<'d>,
    port: Option<u16>,
    listening: bool,
}

impl<'d> StackListener<'d> {
    pub fn new(stack: Stack<'d>) -> Self {
        Self {
            stack,
            port: None,
            listening: false,
        }
    }

    /// Wait up to `wait` for a client. The returned socket borrows the
    /// caller's buffers and is dropped after the exchange.
    pub async fn accept<'b>(
        &self,
        rx_buffer: &'b mut [u8],
        tx_buffer: &'b mut [u8],
        wait: Duration,
    ) -> Option<TcpSocket<'b>>
    where
        'd: 'b,
    {
        let port = match (self.listening, self.port) {
            (true, Some(port)) => port,
            _ => return None,
        };
        let mut socket = TcpSocket::new(self.stack, rx_buffer, tx_buffer);
        match with_timeout(wait, socket.accept(port)).await {
            Ok(Ok(())) => {
                info!("net: connection from {:?}", socket.remote_endpoint());
                Some(socket)
            }
            Ok(Err(e)) => {
                warn!("net: accept failed: {:?}", e);
                None
            }
            Err(_) => None,
        }
    }
}

impl Listener for StackListener<'_> {
    fn bind(&mut self, port: u16) -> Result<(), TransportError> {
        if port == 0 {
            return Err(TransportError::Bind);
        }
        self.port = Some(port);
        Ok(())
    }

    fn listen(&mut self, backlog: u8) -> Result<(), TransportError> {
        if self.port.is_none() {
            return Err(TransportError::Listen);
        }
        if backlog != 1 {
            debug!("net: backlog {} served as 1", backlog);
        }
        self.listening = true;
        Ok(())
    }

    fn close(&mut self) {
        self.listening = false;
    }
}

/// Drive one accepted socket through the server until the exchange ends.
pub async fn serve<L: Listener>(
    server: &mut HttpServer<L>,
    socket: &mut TcpSocket<'_>,
    ctx: &mut NodeContext,
) -> Progress {
    let mut transport = SocketTransport::new();
    if let Err(e) = server.accept(&mut transport) {
        warn!("net: {}", e);
        socket.abort();
        let _ = socket.flush().await;
        return Progress::Aborted;
    }

    let idle = Duration::from_millis(IDLE_POLL_MS);
    let mut rx = [0u8; HEADER_BUF_LEN];
    let mut progress = Progress::Open;
    while progress == Progress::Open {
        progress = if transport.has_pending() {
            let written = with_timeout(idle, socket.write(transport.pending())).await;
            match written {
                Ok(Ok(0)) => server.on_error(),
                Ok(Ok(n)) => {
                    transport.advance(n);
                    server.on_sent(&mut transport, n)
                }
                Ok(Err(e)) => {
                    warn!("net: write: {:?}", e);
                    server.on_error()
                }
                Err(_) => server.on_poll(&mut transport),
            }
        } else {
            let received = with_timeout(idle, socket.read(&mut rx)).await;
            match received {
                Ok(Ok(0)) => server.on_recv(&mut transport, None, ctx),
                Ok(Ok(n)) => server.on_recv(&mut transport, Some(&rx[..n]), ctx),
                Ok(Err(e)) => {
                    warn!("net: read: {:?}", e);
                    server.on_error()
                }
                Err(_) => server.on_poll(&mut transport),
            }
        };
    }

    let hard = transport.abort_requested
        || (progress == Progress::Aborted && !transport.close_requested);
    if hard {
        socket.abort();
    } else {
        socket.close();
    }
    if with_timeout(idle, socket.flush()).await.is_err() {
        socket.abort();
    }
    debug!("net: connection done ({:?})", progress);
    progress
}
