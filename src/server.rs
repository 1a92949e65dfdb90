//! HTTP server lifecycle: one listening endpoint, one connection at a time

use core::fmt;

use log::{info, warn};

use crate::connection::{Connection, Progress};
use crate::http::HTTP_PORT;
use crate::model::NodeContext;
use crate::traits::{Listener, Transport, TransportError};

pub const LISTEN_BACKLOG: u8 = 1;

/// Idle time after which an unfinished connection is closed.
pub const IDLE_POLL_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    NotListening,
    /// A connection is already active; the new one was aborted.
    Busy,
    Transport(TransportError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::NotListening => f.write_str("server not listening"),
            ServerError::Busy => f.write_str("connection already active"),
            ServerError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl From<TransportError> for ServerError {
    fn from(e: TransportError) -> Self {
        ServerError::Transport(e)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub accepted: u32,
    pub rejected: u32,
    pub completed: u32,
    pub aborted: u32,
}

impl ServerStats {
    /// Accepted connections that have not been released yet.
    pub fn outstanding(&self) -> u32 {
        self.accepted - self.completed - self.aborted
    }
}

pub struct HttpServer<L> {
    listener: L,
    listening: bool,
    conn: Option<Connection>,
    stats: ServerStats,
}

impl<L: Listener> HttpServer<L> {
    pub const fn new(listener: L) -> Self {
        Self {
            listener,
            listening: false,
            conn: None,
            stats: ServerStats {
                accepted: 0,
                rejected: 0,
                completed: 0,
                aborted: 0,
            },
        }
    }

    /// Bind the HTTP port and start listening with a backlog of one.
    pub fn open(&mut self) -> Result<(), ServerError> {
        let result = self
            .listener
            .bind(HTTP_PORT)
            .and_then(|()| self.listener.listen(LISTEN_BACKLOG));
        if let Err(e) = result {
            warn!("server: cannot listen on port {}: {}", HTTP_PORT, e);
            self.listener.close();
            return Err(e.into());
        }
        self.listening = true;
        info!("server: listening on port {}", HTTP_PORT);
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_busy(&self) -> bool {
        self.conn.is_some()
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    /// Take on a new client. While a connection is active the newcomer is
    /// aborted and the active one is left alone.
    pub fn accept<T: Transport>(&mut self, transport: &mut T) -> Result<(), ServerError> {
        if !self.listening {
            transport.abort();
            return Err(ServerError::NotListening);
        }
        if self.conn.is_some() {
            warn!("server: busy, rejecting connection");
            transport.abort();
            self.stats.rejected += 1;
            return Err(ServerError::Busy);
        }
        info!("server: client connected");
        self.conn = Some(Connection::new());
        self.stats.accepted += 1;
        Ok(())
    }

    pub fn on_recv<T: Transport>(
        &mut self,
        transport: &mut T,
        segment: Option<&[u8]>,
        ctx: &mut NodeContext,
    ) -> Progress {
        match self.conn.as_mut() {
            Some(conn) => {
                let progress = conn.on_recv(transport, segment, ctx);
                self.settle(progress)
            }
            None => Progress::Closed,
        }
    }

    pub fn on_sent<T: Transport>(&mut self, transport: &mut T, len: usize) -> Progress {
        match self.conn.as_mut() {
            Some(conn) => {
                let progress = conn.on_sent(transport, len);
                self.settle(progress)
            }
            None => Progress::Closed,
        }
    }

    pub fn on_poll<T: Transport>(&mut self, transport: &mut T) -> Progress {
        match self.conn.as_mut() {
            Some(conn) => {
                let progress = conn.on_poll(transport);
                self.settle(progress)
            }
            None => Progress::Closed,
        }
    }

    pub fn on_error(&mut self) -> Progress {
        match self.conn.as_mut() {
            Some(conn) => {
                let progress = conn.on_error();
                self.settle(progress)
            }
            None => Progress::Aborted,
        }
    }

    /// Stop listening and drop any active connection. The caller owns the
    /// client socket and must abort it.
    pub fn shutdown(&mut self) {
        if self.conn.take().is_some() {
            self.stats.aborted += 1;
        }
        if self.listening {
            self.listener.close();
            self.listening = false;
            info!("server: closed");
        }
    }

    fn settle(&mut self, progress: Progress) -> Progress {
        match progress {
            Progress::Open => {}
            Progress::Closed => {
                self.conn = None;
                self.stats.completed += 1;
            }
            Progress::Aborted => {
                self.conn = None;
                self.stats.aborted += 1;
            }
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::{sample_ctx, MockTransport};

    #[derive(Default)]
    struct MockListener {
        port: Option<u16>,
        backlog: Option<u8>,
        closed: usize,
        fail_listen: bool,
    }

    impl Listener for MockListener {
        fn bind(&mut self, port: u16) -> Result<(), TransportError> {
            self.port = Some(port);
            Ok(())
        }

        fn listen(&mut self, backlog: u8) -> Result<(), TransportError> {
            if self.fail_listen {
                return Err(TransportError::Listen);
            }
            self.backlog = Some(backlog);
            Ok(())
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    fn open_server() -> HttpServer<MockListener> {
        let mut server = HttpServer::new(MockListener::default());
        server.open().unwrap();
        server
    }

    #[test]
    fn open_binds_port_80_with_backlog_one() {
        let server = open_server();
        assert!(server.is_listening());
        assert_eq!(server.listener().port, Some(80));
        assert_eq!(server.listener().backlog, Some(1));
    }

    #[test]
    fn listen_failure_closes_the_endpoint() {
        let mut server = HttpServer::new(MockListener {
            fail_listen: true,
            ..Default::default()
        });
        assert_eq!(
            server.open(),
            Err(ServerError::Transport(TransportError::Listen))
        );
        assert!(!server.is_listening());
        assert_eq!(server.listener().closed, 1);

        let mut t = MockTransport::default();
        assert_eq!(server.accept(&mut t), Err(ServerError::NotListening));
        assert_eq!(t.aborted, 1);
    }

    #[test]
    fn request_lifecycle_releases_once() {
        let mut server = open_server();
        let mut ctx = sample_ctx();
        let mut t = MockTransport::default();

        server.accept(&mut t).unwrap();
        assert!(server.is_busy());
        assert_eq!(
            server.on_recv(&mut t, Some(b"GET /api/v1/info HTTP/1.1\r\n\r\n"), &mut ctx),
            Progress::Open
        );
        let total = t.out.len();
        assert_eq!(server.on_sent(&mut t, total - 1), Progress::Open);
        assert_eq!(server.on_sent(&mut t, 1), Progress::Closed);
        assert!(!server.is_busy());

        // Nothing left to release.
        assert_eq!(server.on_sent(&mut t, 1), Progress::Closed);
        assert_eq!(server.on_error(), Progress::Aborted);

        let stats = server.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.aborted, 0);
        assert_eq!(stats.outstanding(), 0);
    }

    #[test]
    fn second_client_is_rejected_while_busy() {
        let mut server = open_server();
        let mut ctx = sample_ctx();
        let mut first = MockTransport::default();
        let mut second = MockTransport::default();

        server.accept(&mut first).unwrap();
        assert_eq!(server.accept(&mut second), Err(ServerError::Busy));
        assert_eq!(second.aborted, 1);
        assert_eq!(first.aborted, 0);

        server.on_recv(&mut first, Some(b"GET /info HTTP/1.1\r\n\r\n"), &mut ctx);
        assert_eq!(first.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(server.stats().rejected, 1);
    }

    #[test]
    fn error_and_poll_release_the_slot() {
        let mut server = open_server();
        let mut t = MockTransport::default();

        server.accept(&mut t).unwrap();
        assert_eq!(server.on_error(), Progress::Aborted);
        assert!(!server.is_busy());

        server.accept(&mut t).unwrap();
        assert_eq!(server.on_poll(&mut t), Progress::Aborted);
        assert!(!server.is_busy());

        let stats = server.stats();
        assert_eq!((stats.accepted, stats.aborted), (2, 2));
    }

    #[test]
    fn shutdown_drops_connection_and_listener() {
        let mut server = open_server();
        let mut t = MockTransport::default();
        server.accept(&mut t).unwrap();
        server.shutdown();
        assert!(!server.is_listening());
        assert!(!server.is_busy());
        assert_eq!(server.listener().closed, 1);
        assert_eq!(server.stats().outstanding(), 0);

        server.shutdown();
        assert_eq!(server.listener().closed, 1);
    }
}
