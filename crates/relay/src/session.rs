use std::collections::HashSet;

/// Per-connection server-side state: the set of topics this session has
/// subscribed to. The socket, outbound queue and read buffer live in
/// `relay-network::Connection`; a `Session` only tracks what the room
/// needs to decide whether to deliver to it.
#[derive(Debug, Default)]
pub struct Session {
    subscriptions: HashSet<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `topic` to the subscription set. Returns `false` if already
    /// subscribed (a no-op per the inbound dispatch table).
    pub fn subscribe(&mut self, topic: String) -> bool {
        self.subscriptions.insert(topic)
    }

    /// Removes `topic` from the subscription set. Returns `false` if it
    /// wasn't subscribed (a no-op).
    pub fn unsubscribe(&mut self, topic: &str) -> bool {
        self.subscriptions.remove(topic)
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }
}
