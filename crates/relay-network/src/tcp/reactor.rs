use std::{io, net::SocketAddr};

use mio::{event::Event, net::TcpListener, net::TcpStream as MioTcpStream, Events, Interest, Poll, Token};
use tracing::{debug, error, warn};

use crate::tcp::connection::{ConnState, Connection};

enum Slot {
    Listener(TcpListener),
    Stream(Connection),
}

/// Event emitted by [`Reactor::poll_once`] for each notable I/O occurrence.
pub enum PollEvent<'a> {
    /// A new connection was accepted from a listener.
    Accept { listener: Token, stream: Token, peer_addr: SocketAddr },
    /// A connection was closed, by the remote or by an I/O error.
    Disconnect { token: Token },
    /// A complete framed message body was received.
    Message { token: Token, body: &'a [u8] },
}

/// Owns the listener/stream table, separate from `Reactor::events` so that
/// `poll_once` can iterate `mio::Events` (borrowing `events`) while
/// dispatching into here (a disjoint field) without a double-borrow.
#[derive(Default)]
struct ConnTable {
    slots: Vec<(Token, Slot)>,
    next_token: usize,
}

impl ConnTable {
    fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn index_of(&self, token: Token) -> Option<usize> {
        self.slots.iter().position(|(t, _)| *t == token)
    }

    fn close_at(&mut self, registry: &mio::Registry, index: usize) {
        let (_, slot) = self.slots.swap_remove(index);
        match slot {
            Slot::Stream(mut conn) => conn.close(registry),
            Slot::Listener(mut listener) => {
                let _ = registry.deregister(&mut listener);
            }
        }
    }

    fn handle_event<F>(&mut self, registry: &mio::Registry, ev: &Event, handler: &mut F)
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        let token = ev.token();
        let Some(i) = self.index_of(token) else {
            warn!(?token, "relay-network: event for unknown token");
            return;
        };

        match &mut self.slots[i].1 {
            Slot::Stream(conn) => {
                let state = conn.poll_with(registry, ev, &mut |body| {
                    handler(PollEvent::Message { token, body });
                });
                if state == ConnState::Disconnected {
                    self.close_at(registry, i);
                    handler(PollEvent::Disconnect { token });
                }
            }
            Slot::Listener(_) => self.accept_all(registry, token, handler),
        }
    }

    fn accept_all<F>(&mut self, registry: &mio::Registry, listener_token: Token, handler: &mut F)
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        loop {
            let Some(i) = self.index_of(listener_token) else { return };
            let Slot::Listener(listener) = &mut self.slots[i].1 else { return };

            match listener.accept() {
                Ok((mut stream, addr)) => {
                    debug!(?addr, "client connected");
                    let token = self.alloc_token();
                    if let Err(err) = registry.register(&mut stream, token, Interest::READABLE) {
                        error!(?err, "relay-network: failed to register accepted stream");
                        continue;
                    }
                    let conn = match Connection::from_stream(stream, addr, token) {
                        Ok(conn) => conn,
                        Err(err) => {
                            error!(?err, "relay-network: failed to wrap accepted stream");
                            continue;
                        }
                    };
                    self.slots.push((token, Slot::Stream(conn)));
                    handler(PollEvent::Accept {
                        listener: listener_token,
                        stream: token,
                        peer_addr: addr,
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) => {
                    warn!(?err, "relay-network: accept failed");
                    return;
                }
            }
        }
    }
}

/// Non-blocking TCP reactor built on `mio`.
///
/// No outbound auto-reconnect: this broker only ever accepts inbound
/// sessions, and the one outbound connection a client makes is driven
/// explicitly by `CONNECT`/`DISCONNECT` commands, never retried
/// automatically.
///
/// Drive all I/O by calling [`poll_once`] in a loop. Use [`send`] to queue a
/// frame to one connection.
pub struct Reactor {
    poll: Poll,
    events: Events,
    conns: ConnTable,
}

impl Default for Reactor {
    fn default() -> Self {
        Self {
            poll: Poll::new().expect("failed to create mio::Poll"),
            events: Events::with_capacity(128),
            conns: ConnTable::default(),
        }
    }
}

impl Reactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts listening on `addr`. Returns the listener's token.
    pub fn listen_at(&mut self, addr: SocketAddr) -> io::Result<Token> {
        let mut listener = TcpListener::bind(addr)?;
        let token = self.conns.alloc_token();
        self.poll.registry().register(&mut listener, token, Interest::READABLE)?;
        self.conns.slots.push((token, Slot::Listener(listener)));
        Ok(token)
    }

    /// Returns the address a listener is bound to. Used by the server
    /// binary to report its actual port when bound to `:0`, and by tests
    /// that need an ephemeral port.
    pub fn local_addr(&self, token: Token) -> io::Result<SocketAddr> {
        let i = self
            .conns
            .index_of(token)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown token"))?;
        match &self.conns.slots[i].1 {
            Slot::Listener(listener) => listener.local_addr(),
            Slot::Stream(_) => Err(io::Error::new(io::ErrorKind::InvalidInput, "not a listener")),
        }
    }

    /// Opens an outbound connection to `addr`. The connect itself is a
    /// quick blocking syscall (this broker only ever dials `127.0.0.1`);
    /// all framed I/O afterwards is non-blocking.
    pub fn connect(&mut self, addr: SocketAddr) -> io::Result<Token> {
        let std_stream = std::net::TcpStream::connect(addr)?;
        std_stream.set_nonblocking(true)?;
        let mut mio_stream = MioTcpStream::from_std(std_stream);
        let token = self.conns.alloc_token();
        self.poll.registry().register(&mut mio_stream, token, Interest::READABLE)?;
        let conn = Connection::from_stream(mio_stream, addr, token)?;
        self.conns.slots.push((token, Slot::Stream(conn)));
        Ok(token)
    }

    /// Queues an already-encoded frame to `token`. Returns
    /// `ConnState::Disconnected` if the write failed and the connection was
    /// torn down, or if `token` was already unknown (e.g. it disconnected
    /// between the caller snapshotting its target list and this call).
    /// Callers that track membership (like a `Room`) must treat either as
    /// a departure, since no `PollEvent::Disconnect` follows a send-time
    /// failure.
    pub fn send(&mut self, token: Token, frame: Vec<u8>) -> ConnState {
        let Some(i) = self.conns.index_of(token) else {
            warn!(?token, "relay-network: send to unknown token");
            return ConnState::Disconnected;
        };
        match &mut self.conns.slots[i].1 {
            Slot::Stream(conn) => {
                let state = conn.write_or_enqueue(self.poll.registry(), frame);
                if state == ConnState::Disconnected {
                    self.conns.close_at(self.poll.registry(), i);
                }
                state
            }
            Slot::Listener(_) => {
                error!(?token, "relay-network: cannot send to a listener");
                ConnState::Alive
            }
        }
    }

    /// Disconnects `token` immediately (no-op if unknown).
    pub fn disconnect(&mut self, token: Token) {
        if let Some(i) = self.conns.index_of(token) {
            self.conns.close_at(self.poll.registry(), i);
        }
    }

    /// Polls once (zero-timeout) and dispatches every ready event to
    /// `handler`. Returns whether any event was processed.
    pub fn poll_once<F>(&mut self, mut handler: F) -> io::Result<bool>
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        self.poll.poll(&mut self.events, Some(std::time::Duration::ZERO))?;

        let mut any = false;
        for e in self.events.iter() {
            any = true;
            self.conns.handle_event(self.poll.registry(), e, &mut handler);
        }
        Ok(any)
    }
}
