use crate::prelude::*;
use super::request::{self, Request};
use super::Response;
use std::io::{Read, Write};
use std::net::{IpAddr, TcpStream};

/// The peer went away, or broke the protocol badly enough to be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnection;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum State {
    Reading,
    /// Parked until the render started by request `serial` finishes.
    Rendering { serial: u64 },
    Writing,
}

pub struct Client {
    conn: TcpStream,
    peer: Option<IpAddr>,
    state: State,
    received: Vec<u8>,
    head_only: bool,
    pending_bytes: Vec<u8>,
    pending_byte_cursor: usize,

    pub(super) waiting_for_write: bool,
}
impl Client {
    pub fn accept(conn: TcpStream) -> io::Result<Self> {
        conn.set_nonblocking(true)?;
        Ok(Self {
            peer: conn.peer_addr().ok().map(|addr| addr.ip()),
            conn,
            state: State::Reading,
            received: vec![],
            head_only: false,
            pending_bytes: vec![],
            pending_byte_cursor: 0,
            waiting_for_write: false,
        })
    }
    pub(super) fn conn(&self) -> &TcpStream {
        &self.conn
    }
    pub(super) fn peer(&self) -> Option<IpAddr> {
        self.peer
    }
    pub(super) fn park(&mut self, serial: u64) {
        self.state = State::Rendering { serial };
    }
    pub(super) fn is_parked_on(&self, serial: u64) -> bool {
        self.state == State::Rendering { serial }
    }

    /// Queues `response`; the connection is closed once it has been sent.
    pub(super) fn submit(&mut self, response: Response) {
        log::trace!("answering {:?}", response.status());
        self.pending_bytes = response.encode(self.head_only);
        self.pending_byte_cursor = 0;
        self.state = State::Writing;
        self.waiting_for_write = true;
    }

    /// Drains the socket into the receive buffer and returns the request once
    /// it is complete. Only one request is served per connection.
    pub(super) fn read(&mut self, scratch: &mut [u8]) -> Result<Option<Request>, Disconnection> {
        loop {
            match self.conn.read(scratch) {
                Ok(0) => return Err(Disconnection),
                Ok(n) => {
                    if self.state == State::Reading {
                        self.received.extend_from_slice(&scratch[..n]);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("read from {:?} failed: {e}", self.peer);
                    return Err(Disconnection);
                }
            }
        }
        if self.state != State::Reading {
            return Ok(None);
        }
        match request::parse(&self.received) {
            Ok(None) => Ok(None),
            Ok(Some((request, _))) => {
                self.received = vec![];
                self.head_only = request.method == request::Method::Head;
                Ok(Some(request))
            }
            Err(request::BadRequest) => {
                log::debug!("malformed request from {:?}", self.peer);
                self.received = vec![];
                self.submit(Response::BadRequest);
                Ok(None)
            }
        }
    }

    /// Sends whatever is pending. Returns `true` once the response is out.
    pub(super) fn write(&mut self) -> Result<bool, Disconnection> {
        self.waiting_for_write = false;
        if self.state != State::Writing {
            return Ok(false);
        }
        while self.pending_byte_cursor < self.pending_bytes.len() {
            match self.conn.write(&self.pending_bytes[self.pending_byte_cursor..]) {
                Ok(0) => return Err(Disconnection),
                Ok(n) => self.pending_byte_cursor += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.waiting_for_write = true;
                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("write to {:?} failed: {e}", self.peer);
                    return Err(Disconnection);
                }
            }
        }
        let _ = self.conn.shutdown(std::net::Shutdown::Write);
        Ok(true)
    }
}
impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .field("pending", &(self.pending_bytes.len() - self.pending_byte_cursor))
            .finish()
    }
}
