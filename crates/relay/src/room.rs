use std::collections::HashMap;

use relay_protocol::ClientMessage;
use relay_utils::safe_assert;
use tracing::info;

use crate::{Session, SessionId};

/// The outcome of a client message that callers must act on: a publish
/// that needs to be framed and written to `targets`. Subscribe/Unsubscribe
/// are fully handled inside `Room::handle_message` and never produce one.
#[derive(Debug, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub data: Vec<u8>,
    pub targets: Vec<SessionId>,
}

/// The broker's per-endpoint session registry and fan-out point.
///
/// One `Room` per listening endpoint. Mutated only by join/leave/
/// handle_message, all from the single thread that drives the reactor,
/// so there's no need for interior locking.
#[derive(Debug, Default)]
pub struct Room {
    sessions: HashMap<SessionId, Session>,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, id: SessionId) {
        self.sessions.insert(id, Session::new());
        info!("A client connected.");
    }

    /// Idempotent: removing a session that already left (or never joined)
    /// is a no-op.
    pub fn leave(&mut self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            info!("A client disconnected.");
        }
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies an inbound client message from session `from`. Subscribe
    /// and Unsubscribe mutate state directly and return `None`; Publish
    /// computes the delivery target list (a snapshot, so sessions leaving
    /// mid-broadcast afterward are simply never re-visited) and returns it
    /// for the caller to encode and send. Unknown is ignored silently.
    pub fn handle_message(&mut self, from: SessionId, msg: ClientMessage) -> Option<Delivery> {
        safe_assert!(
            self.sessions.contains_key(&from),
            "message from session {from} not registered in the room"
        );
        match msg {
            ClientMessage::Subscribe { topic } => {
                info!("A client tries to subscribe to the topic \"{topic}\".");
                if let Some(session) = self.sessions.get_mut(&from) {
                    session.subscribe(topic);
                }
                None
            }
            ClientMessage::Unsubscribe { topic } => {
                info!("A client tries to unsubscribe from the topic \"{topic}\".");
                if let Some(session) = self.sessions.get_mut(&from) {
                    session.unsubscribe(&topic);
                }
                None
            }
            ClientMessage::Publish { topic, data } => {
                info!(
                    "A client sent data \"{}\" with topic \"{topic}\".",
                    String::from_utf8_lossy(&data),
                );
                let targets = self.deliver_targets(&topic);
                Some(Delivery { topic, data, targets })
            }
            ClientMessage::Unknown => None,
        }
    }

    /// Sessions currently subscribed to `topic`, as a snapshot. Collecting
    /// into a `Vec` up front means a session removed mid-broadcast just
    /// never receives this delivery, rather than the iteration tripping
    /// over a mutated map.
    fn deliver_targets(&self, topic: &str) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.is_subscribed(topic))
            .map(|(id, _)| *id)
            .collect()
    }
}
