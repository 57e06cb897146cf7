use std::{
    collections::VecDeque,
    io::{self, IoSlice, Read, Write},
    net::SocketAddr,
};

use mio::{event::Event, Interest, Registry};
use relay_protocol::{HEADER_LEN, MAX_BODY_LEN};
use tracing::{debug, warn};

/// Response type for all external calls: whether the connection is still
/// usable or must be torn down.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

enum ReadOutcome<'a> {
    FrameDone { body: &'a [u8] },
    WouldBlock,
    Disconnected,
    Malformed,
}

#[derive(Clone, Copy)]
enum RxState {
    ReadingHeader { buf: [u8; HEADER_LEN], have: usize },
    ReadingBody { len: usize, offset: usize },
}

/// A single non-blocking framed TCP connection.
///
/// Frames are `HEADER_LEN` bytes of ASCII-decimal length prefix followed by
/// up to `MAX_BODY_LEN` bytes of body (see `relay_protocol::frame`).
///
/// Outbound: `write_or_enqueue` attempts a non-blocking write immediately;
/// any unwritten remainder is queued and flushed as the socket becomes
/// writable, preserving FIFO order with at most one write in flight.
///
/// Inbound: `poll_with` reads and reassembles frames, invoking the caller's
/// callback once per complete body. A malformed header disconnects the
/// connection rather than trying to resynchronize on the stream.
pub struct Connection {
    stream: mio::net::TcpStream,
    peer_addr: SocketAddr,
    /// The token this stream is currently registered under. Re-registering
    /// interest must reuse it: passing a different token would redirect
    /// future events for this socket to the wrong slot.
    token: mio::Token,

    rx_state: RxState,
    rx_buf: [u8; MAX_BODY_LEN],

    /// Queued outbound frames. The front entry is either a full frame or the
    /// partially written remainder of one.
    send_backlog: VecDeque<Vec<u8>>,

    /// Invariant: `writable_armed == !send_backlog.is_empty()`.
    writable_armed: bool,
}

impl Connection {
    pub(crate) fn from_stream(
        stream: mio::net::TcpStream,
        peer_addr: SocketAddr,
        token: mio::Token,
    ) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer_addr,
            token,
            rx_state: RxState::ReadingHeader { buf: [0; HEADER_LEN], have: 0 },
            rx_buf: [0; MAX_BODY_LEN],
            send_backlog: VecDeque::with_capacity(4),
            writable_armed: false,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Polls this connection and calls `on_frame` for every fully
    /// assembled frame body. The slice passed to `on_frame` is only valid
    /// for the duration of the callback.
    pub fn poll_with<F>(&mut self, registry: &Registry, ev: &Event, on_frame: &mut F) -> ConnState
    where
        F: for<'a> FnMut(&'a [u8]),
    {
        if ev.is_readable() {
            loop {
                match self.read_frame() {
                    ReadOutcome::FrameDone { body } => on_frame(body),
                    ReadOutcome::WouldBlock => break,
                    ReadOutcome::Disconnected | ReadOutcome::Malformed => {
                        return ConnState::Disconnected;
                    }
                }
            }
        }

        if ev.is_writable() && self.drain_backlog(registry) == ConnState::Disconnected {
            return ConnState::Disconnected;
        }

        ConnState::Alive
    }

    /// Encodes `body` as a frame and writes it now if possible, otherwise
    /// queues it for the next writable event. Fails loudly only via the
    /// returned `ConnState`; callers that need `OversizedBody` surfaced
    /// should encode through `relay_protocol::message` first.
    pub fn write_or_enqueue(&mut self, registry: &Registry, frame: Vec<u8>) -> ConnState {
        if !self.send_backlog.is_empty() {
            return self.enqueue_back(registry, frame);
        }

        match self.stream.write_vectored(&[IoSlice::new(&frame)]) {
            Ok(0) => {
                warn!("relay-network: write returned 0, disconnecting");
                ConnState::Disconnected
            }
            Ok(n) if n == frame.len() => ConnState::Alive,
            Ok(n) => {
                let remainder = frame[n..].to_vec();
                self.enqueue_back(registry, remainder)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.enqueue_back(registry, frame)
            }
            Err(err) => {
                warn!(?err, "relay-network: write failed");
                ConnState::Disconnected
            }
        }
    }

    fn drain_backlog(&mut self, registry: &Registry) -> ConnState {
        while let Some(front) = self.send_backlog.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) if n == front.len() => {
                    self.send_backlog.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(?err, "relay-network: write from backlog failed");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.send_backlog.is_empty() && self.writable_armed {
            if let Err(err) = registry.reregister(&mut self.stream, self.token, Interest::READABLE)
            {
                debug!(?err, "relay-network: reregister to drop writable failed");
                return ConnState::Disconnected;
            }
            self.writable_armed = false;
        }

        ConnState::Alive
    }

    fn read_frame(&mut self) -> ReadOutcome<'_> {
        loop {
            match self.rx_state {
                RxState::ReadingHeader { mut buf, mut have } => {
                    while have < HEADER_LEN {
                        match self.stream.read(&mut buf[have..]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => {
                                have += n;
                                if have == HEADER_LEN {
                                    let Ok(len) = relay_protocol::decode_header(&buf) else {
                                        debug!("relay-network: malformed header, disconnecting");
                                        return ReadOutcome::Malformed;
                                    };
                                    self.rx_state = RxState::ReadingBody { len, offset: 0 };
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                self.rx_state = RxState::ReadingHeader { buf, have };
                                return ReadOutcome::WouldBlock;
                            }
                            Err(err) => {
                                debug!(?err, "relay-network: read header failed");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }
                }

                RxState::ReadingBody { len, mut offset } => {
                    if len == 0 {
                        self.rx_state = RxState::ReadingHeader { buf: [0; HEADER_LEN], have: 0 };
                        return ReadOutcome::FrameDone { body: &self.rx_buf[..0] };
                    }

                    while offset < len {
                        match self.stream.read(&mut self.rx_buf[offset..len]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => {
                                offset += n;
                                if offset == len {
                                    self.rx_state =
                                        RxState::ReadingHeader { buf: [0; HEADER_LEN], have: 0 };
                                    return ReadOutcome::FrameDone { body: &self.rx_buf[..len] };
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                self.rx_state = RxState::ReadingBody { len, offset };
                                return ReadOutcome::WouldBlock;
                            }
                            Err(err) => {
                                debug!(?err, "relay-network: read body failed");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }
                }
            }
        }
    }

    fn enqueue_back(&mut self, registry: &Registry, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_back(data);
        self.arm_writable(registry)
    }

    fn arm_writable(&mut self, registry: &Registry) -> ConnState {
        if !self.writable_armed {
            if let Err(err) = registry.reregister(
                &mut self.stream,
                self.token,
                Interest::READABLE | Interest::WRITABLE,
            ) {
                debug!(?err, "relay-network: reregister to arm writable failed");
                return ConnState::Disconnected;
            }
            self.writable_armed = true;
        }
        ConnState::Alive
    }

    pub fn close(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
