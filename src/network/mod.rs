//! HTTP on a single thread: one [`polling::Poller`] watches the listener and
//! every connection, and is also woken by render workers when they finish.
use crate::prelude::*;
use crate::access::{self, MANAGEMENT_COOKIE};
use crate::frontend::Frontend;
use crate::render::Waker;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;

mod response;
mod request;
mod routes;
pub mod wire;
pub mod client;

pub use request::{Method, Request};
pub use response::Response;

/// Identifies the request a render is answering. The serial keeps a page from
/// reaching a later connection that reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    client: usize,
    serial: u64,
}

#[derive(Debug)]
pub struct Network {
    listener: TcpListener,
    scratch_buffer: Vec<u8>,

    poller: Arc<polling::Poller>,
    events: Vec<polling::Event>,

    clients: SlotMap<client::Client>,
    serial: u64,
    last_client: Option<IpAddr>,
}

const LISTENER: usize = usize::MAX - 1;
impl Network {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let poller = polling::Poller::new()?;

        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        poller.add(&listener, polling::Event::readable(LISTENER))?;
        Ok(Self {
            listener,
            scratch_buffer: vec![0; 16 * 1024],

            poller: Arc::new(poller),
            events: vec![],

            clients: SlotMap::new(),
            serial: 0,
            last_client: None,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Interrupts a wait in progress, from any thread.
    pub fn waker(&self) -> Waker {
        let poller = Arc::clone(&self.poller);
        Arc::new(move || {
            if let Err(e) = poller.notify() {
                log::warn!("unable to wake the event loop: {e}");
            }
        })
    }

    /// Number of open connections.
    pub fn connections(&self) -> usize {
        self.clients.len()
    }

    /// Serves until `deadline`, or forever without one.
    pub fn process_requests_until(
        &mut self,
        deadline: Option<time::Instant>,
        frontend: &mut Frontend<Ticket>,
    ) -> io::Result<()> {
        loop {
            let timeout = match deadline {
                None => None,
                Some(deadline) => match deadline.checked_duration_since(time::Instant::now()) {
                    Some(v) => Some(v),
                    None => return Ok(()),
                },
            };
            match self.poller.wait(&mut self.events, timeout) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
            for (ticket, html) in frontend.finish_renders() {
                self.deliver(ticket, html);
            }
            while let Some(event) = self.events.pop() {
                if event.key == LISTENER {
                    self.poller.modify(&self.listener, polling::Event::readable(LISTENER))?;
                    self.accept_viewers();
                    continue;
                }
                self.service(event, frontend);
            }
        }
    }

    fn accept_viewers(&mut self) {
        loop {
            match self.listener.accept() {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("unable to accept a connection: {e}");
                    break;
                }
                Ok((conn, addr)) => {
                    let client = match client::Client::accept(conn) {
                        Ok(client) => client,
                        Err(e) => {
                            log::warn!("dropping connection from {addr}: {e}");
                            continue;
                        }
                    };
                    let interest = polling::Event::readable(self.clients.next_idx());
                    if let Err(e) = self.poller.add(client.conn(), interest) {
                        log::warn!("dropping connection from {addr}: {e}");
                        continue;
                    }
                    let idx = self.clients.insert(client);
                    log::debug!("new connection from {addr} as {idx}");
                }
            }
        }
    }

    fn service(&mut self, event: polling::Event, frontend: &mut Frontend<Ticket>) {
        let Some(client) = self.clients.get(event.key) else {
            log::debug!("event for closed connection {}", event.key);
            return;
        };
        if event.readable {
            match client.read(&mut self.scratch_buffer) {
                Err(client::Disconnection) => return self.disconnect(event.key),
                Ok(Some(request)) => self.dispatch(event.key, request, frontend),
                Ok(None) => {}
            }
        }
        self.flush(event.key);
    }

    fn dispatch(&mut self, key: usize, request: Request, frontend: &mut Frontend<Ticket>) {
        let Some(client) = self.clients.get(key) else { return };
        let addr = access::client_addr(client.peer(), request.header("x-forwarded-for"));
        let viewer = frontend.authorize(addr, request.cookie(MANAGEMENT_COOKIE).as_deref());
        if addr != self.last_client {
            let shown = addr.map_or_else(|| "unknown".to_owned(), |a| a.to_string());
            log::info!("IP address={shown} {viewer:?}");
            self.last_client = addr;
        }
        self.serial += 1;
        let ticket = Ticket { client: key, serial: self.serial };
        match routes::route(frontend, viewer, &request, ticket) {
            routes::Routed::Reply(response) => client.submit(response),
            routes::Routed::Pending => client.park(ticket.serial),
        }
    }

    fn deliver(&mut self, ticket: Ticket, html: String) {
        match self.clients.get(ticket.client) {
            Some(client) if client.is_parked_on(ticket.serial) => {
                client.submit(Response::Page(html));
                self.flush(ticket.client);
            }
            _ => log::debug!("viewer waiting on render {} went away", ticket.serial),
        }
    }

    /// Writes what the connection has pending, then re-arms it, or closes it
    /// when its response is out.
    fn flush(&mut self, key: usize) {
        let Some(client) = self.clients.get(key) else { return };
        if client.waiting_for_write {
            match client.write() {
                Ok(false) => {}
                Ok(true) | Err(client::Disconnection) => return self.disconnect(key),
            }
        }
        let interest = polling::Event { key, readable: true, writable: client.waiting_for_write };
        if let Err(e) = self.poller.modify(client.conn(), interest) {
            log::warn!("unable to watch connection {key}: {e}");
            self.disconnect(key);
        }
    }

    fn disconnect(&mut self, key: usize) {
        if let Some(client) = self.clients.release(key) {
            log::debug!("closing connection {key}");
            let _ = self.poller.delete(client.conn());
        }
    }
}
