//! The broker engine: per-connection subscription state (`Session`) and
//! topic-filtered fan-out across all live connections (`Room`).
//!
//! This crate is transport-agnostic: it knows nothing about `mio` or
//! sockets. The caller (the `relay-server` binary) owns a
//! `relay_network::Reactor`, decodes inbound frames with
//! `relay_protocol`, feeds the decoded messages to a `Room`, and sends
//! whatever `Delivery` comes back through the reactor. Keeping the pure
//! broker state separate from socket plumbing is what lets `Room` and
//! `Session` be tested without a real connection.

mod room;
mod session;

pub use relay_protocol::ClientMessage;
pub use room::{Delivery, Room};
pub use session::Session;

/// Identifies a session within a `Room`. The caller picks the numbering
/// scheme; the `relay-server` binary uses the underlying
/// `relay_network::Token`'s index.
pub type SessionId = usize;
