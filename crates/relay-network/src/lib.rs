//! Non-blocking TCP transport for the relay pub/sub broker.
//!
//! One reactor thread drives a listener (server side) or a single
//! outbound connection (client side), framing reads/writes per
//! `relay_protocol::frame` and keeping at most one write in flight per
//! connection.

pub mod tcp;

pub use tcp::{ConnState, Connection, PollEvent, Reactor};
pub use mio::Token;
