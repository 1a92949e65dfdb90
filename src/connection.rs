//! Per-connection HTTP state machine
//!
//! A [`Connection`] is created on accept and driven by the transport events:
//! data received, bytes acknowledged, idle poll and error. It answers exactly
//! one request and then closes; there is no keep-alive.

use log::{debug, info, warn};

use crate::buffer::{BoundedWriter, Overflow};
use crate::content;
use crate::http::{self, ContentType, Method, Route, Status};
use crate::model::NodeContext;
use crate::traits::Transport;

pub const HEADER_BUF_LEN: usize = 128;
pub const BODY_BUF_LEN: usize = 1152;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Accepted,
    HeaderReceived,
    ResponseComposed,
    Sending,
    /// Every byte was acknowledged, or the peer closed first.
    Closed,
    Aborted,
}

/// What the owner should do with the connection after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Open,
    Closed,
    Aborted,
}

pub struct Connection {
    /// Inbound request head, reused for the outbound header block.
    headers: [u8; HEADER_BUF_LEN],
    body: [u8; BODY_BUF_LEN],
    request_len: usize,
    header_len: usize,
    body_len: usize,
    sent_len: usize,
    state: ConnState,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub const fn new() -> Self {
        Self {
            headers: [0; HEADER_BUF_LEN],
            body: [0; BODY_BUF_LEN],
            request_len: 0,
            header_len: 0,
            body_len: 0,
            sent_len: 0,
            state: ConnState::Accepted,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn response_len(&self) -> usize {
        self.header_len + self.body_len
    }

    pub fn sent_len(&self) -> usize {
        self.sent_len
    }

    /// A received segment. `None` or an empty segment means the peer closed.
    pub fn on_recv<T: Transport>(
        &mut self,
        transport: &mut T,
        segment: Option<&[u8]>,
        ctx: &mut NodeContext,
    ) -> Progress {
        if let Some(done) = self.terminal() {
            return done;
        }
        let data = match segment {
            Some(data) if !data.is_empty() => data,
            _ => {
                debug!("conn: peer closed");
                return self.finish(transport, ConnState::Closed);
            }
        };
        if self.state != ConnState::Accepted {
            // One request per connection; later segments are not buffered.
            debug!("conn: ignoring {} further bytes", data.len());
            return Progress::Open;
        }

        let n = data.len().min(HEADER_BUF_LEN);
        self.headers[..n].copy_from_slice(&data[..n]);
        self.request_len = n;
        self.state = ConnState::HeaderReceived;

        self.compose(ctx);
        self.state = ConnState::ResponseComposed;
        self.send(transport)
    }

    /// The transport acknowledged `len` more bytes.
    pub fn on_sent<T: Transport>(&mut self, transport: &mut T, len: usize) -> Progress {
        if let Some(done) = self.terminal() {
            return done;
        }
        if self.state != ConnState::Sending {
            return Progress::Open;
        }
        self.sent_len += len;
        if self.sent_len >= self.response_len() {
            debug!("conn: {} bytes acknowledged", self.sent_len);
            return self.finish(transport, ConnState::Closed);
        }
        Progress::Open
    }

    /// Idle timer fired before the exchange completed.
    pub fn on_poll<T: Transport>(&mut self, transport: &mut T) -> Progress {
        if let Some(done) = self.terminal() {
            return done;
        }
        info!(
            "conn: idle in {:?} after {}/{} bytes, closing",
            self.state,
            self.sent_len,
            self.response_len()
        );
        self.finish(transport, ConnState::Aborted)
    }

    /// The transport reported an error; the socket must not be touched again.
    pub fn on_error(&mut self) -> Progress {
        if let Some(done) = self.terminal() {
            return done;
        }
        warn!("conn: transport error in {:?}", self.state);
        self.state = ConnState::Aborted;
        Progress::Aborted
    }

    fn terminal(&self) -> Option<Progress> {
        match self.state {
            ConnState::Closed => Some(Progress::Closed),
            ConnState::Aborted => Some(Progress::Aborted),
            _ => None,
        }
    }

    fn finish<T: Transport>(&mut self, transport: &mut T, state: ConnState) -> Progress {
        match transport.close() {
            Ok(()) => {
                self.state = state;
                if state == ConnState::Closed {
                    Progress::Closed
                } else {
                    Progress::Aborted
                }
            }
            Err(e) => {
                warn!("conn: {}, aborting", e);
                transport.abort();
                self.state = ConnState::Aborted;
                Progress::Aborted
            }
        }
    }

    /// Fill the header and body buffers for the request held in `headers`.
    fn compose(&mut self, ctx: &mut NodeContext) {
        let request = &self.headers[..self.request_len];
        let method = Method::classify(request);
        self.body_len = 0;

        let outcome = match method {
            Method::Get => match http::parse_target(request) {
                Some(target) => match Route::resolve(target.path) {
                    Some(route) => {
                        debug!("conn: GET {}", target.path);
                        let content_type = ContentType::from_path(target.path);
                        let mut body = BoundedWriter::new(&mut self.body);
                        match content::render(route, target.query, ctx, &mut body) {
                            Ok(()) if body.is_empty() => Err(Status::NotFound),
                            Ok(()) => {
                                self.body_len = body.len();
                                Ok(content_type)
                            }
                            Err(Overflow) => {
                                warn!("conn: {} overflows the body buffer", target.path);
                                Err(Status::InternalServerError)
                            }
                        }
                    }
                    None => {
                        info!("conn: no route for {}", target.path);
                        Err(Status::NotFound)
                    }
                },
                None => Err(Status::NotFound),
            },
            Method::Post => Err(Status::NotImplemented),
            Method::Other => Err(Status::NotFound),
        };

        let mut head = BoundedWriter::new(&mut self.headers);
        let written = match outcome {
            Ok(content_type) => http::write_ok_header(&mut head, content_type, self.body_len),
            Err(status) => {
                debug!("conn: answering {}", status.code());
                http::write_error_header(&mut head, status)
            }
        };
        if written.is_err() {
            head.clear();
            self.body_len = 0;
            // The error block is far shorter than the header buffer.
            let _ = http::write_error_header(&mut head, Status::InternalServerError);
        }
        self.header_len = head.len();
    }

    fn send<T: Transport>(&mut self, transport: &mut T) -> Progress {
        self.sent_len = 0;
        self.state = ConnState::Sending;
        let mut result = transport.write(&self.headers[..self.header_len]);
        if result.is_ok() && self.body_len > 0 {
            result = transport.write(&self.body[..self.body_len]);
        }
        match result {
            Ok(()) => Progress::Open,
            Err(e) => {
                warn!("conn: {}", e);
                transport.abort();
                self.state = ConnState::Aborted;
                Progress::Aborted
            }
        }
    }
}
