mod connection;
mod reactor;

pub use connection::{ConnState, Connection};
pub use reactor::{PollEvent, Reactor};
