//! Drives a real `relay-network::Reactor` + `relay::Room` the way
//! `relay-server`'s main loop does, over loopback sockets, to exercise
//! multi-client publish/subscribe scenarios end to end rather than just
//! `Room` in isolation.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    thread,
    time::Duration,
};

use relay::Room;
use relay_network::{ConnState, PollEvent, Reactor, Token};

struct Server {
    reactor: Reactor,
    room: Room,
}

impl Server {
    fn bind() -> (Self, SocketAddr) {
        let mut reactor = Reactor::new();
        let listener = reactor.listen_at(SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0))).unwrap();
        let addr = reactor.local_addr(listener).unwrap();
        (Self { reactor, room: Room::new() }, addr)
    }

    /// One iteration of the same accept/dispatch/deliver loop
    /// `relay-server`'s `main` runs, minus the CLI/logging/signal concerns.
    fn tick(&mut self) {
        let mut pending = Vec::new();
        self.reactor
            .poll_once(|event| {
                pending.push(match event {
                    PollEvent::Accept { stream, .. } => Pending::Accept(stream),
                    PollEvent::Disconnect { token } => Pending::Disconnect(token),
                    PollEvent::Message { token, body } => {
                        Pending::Message(token, relay_protocol::decode_client(body))
                    }
                });
            })
            .unwrap();

        for item in pending {
            match item {
                Pending::Accept(token) => self.room.join(token.0),
                Pending::Disconnect(token) => self.room.leave(token.0),
                Pending::Message(token, msg) => {
                    if let Some(delivery) = self.room.handle_message(token.0, msg) {
                        let frame =
                            relay_protocol::encode_server_deliver(&delivery.topic, &delivery.data).unwrap();
                        for target in delivery.targets {
                            if self.reactor.send(Token(target), frame.clone()) == ConnState::Disconnected {
                                self.room.leave(target);
                            }
                        }
                    }
                }
            }
        }
    }
}

enum Pending {
    Accept(Token),
    Disconnect(Token),
    Message(Token, relay::ClientMessage),
}

struct Client {
    reactor: Reactor,
    token: Token,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let mut reactor = Reactor::new();
        let token = reactor.connect(addr).unwrap();
        Self { reactor, token }
    }

    fn send_frame(&mut self, frame: Vec<u8>) {
        self.reactor.send(self.token, frame);
    }

    fn subscribe(&mut self, topic: &str) {
        self.send_frame(relay_protocol::encode_subscribe(topic).unwrap());
    }

    fn unsubscribe(&mut self, topic: &str) {
        self.send_frame(relay_protocol::encode_unsubscribe(topic).unwrap());
    }

    fn publish(&mut self, topic: &str, data: &[u8]) {
        self.send_frame(relay_protocol::encode_publish(topic, data).unwrap());
    }

    fn drain_deliveries(&mut self) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        self.reactor
            .poll_once(|event| {
                if let PollEvent::Message { body, .. } = event {
                    if let Ok(d) = relay_protocol::decode_server_deliver(body) {
                        out.push((d.topic, d.data));
                    }
                }
            })
            .unwrap();
        out
    }
}

const SETTLE: Duration = Duration::from_millis(5);

fn settle(server: &mut Server) {
    for _ in 0..50 {
        server.tick();
        thread::sleep(SETTLE);
    }
}

#[test]
fn simple_publish_reaches_only_the_subscriber() {
    let (mut server, addr) = Server::bind();
    let mut a = Client::connect(addr);
    let mut b = Client::connect(addr);
    settle(&mut server);

    a.subscribe("weather");
    settle(&mut server);

    b.publish("weather", b"sunny");
    settle(&mut server);

    assert_eq!(a.drain_deliveries(), vec![("weather".to_string(), b"sunny".to_vec())]);
    assert_eq!(b.drain_deliveries(), vec![]);
}

#[test]
fn self_delivery_when_publisher_is_subscribed() {
    let (mut server, addr) = Server::bind();
    let mut a = Client::connect(addr);
    settle(&mut server);

    a.subscribe("chat");
    settle(&mut server);
    a.publish("chat", b"hello");
    settle(&mut server);

    assert_eq!(a.drain_deliveries(), vec![("chat".to_string(), b"hello".to_vec())]);
}

#[test]
fn unsubscribe_stops_future_delivery() {
    let (mut server, addr) = Server::bind();
    let mut a = Client::connect(addr);
    let mut b = Client::connect(addr);
    settle(&mut server);

    a.subscribe("x");
    settle(&mut server);
    a.unsubscribe("x");
    settle(&mut server);
    b.publish("x", b"anything");
    settle(&mut server);

    assert_eq!(a.drain_deliveries(), vec![]);
}

#[test]
fn multi_topic_filtering_delivers_only_matching_topics_in_order() {
    let (mut server, addr) = Server::bind();
    let mut a = Client::connect(addr);
    let mut c = Client::connect(addr);
    settle(&mut server);

    a.subscribe("a");
    a.subscribe("b");
    settle(&mut server);

    c.publish("a", b"1");
    settle(&mut server);
    c.publish("c", b"2");
    settle(&mut server);
    c.publish("b", b"3");
    settle(&mut server);

    assert_eq!(
        a.drain_deliveries(),
        vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), b"3".to_vec())]
    );
}

#[test]
fn peer_loss_is_graceful_and_other_publishes_still_work() {
    let (mut server, addr) = Server::bind();
    let mut a = Client::connect(addr);
    let mut b = Client::connect(addr);
    settle(&mut server);

    a.subscribe("q");
    settle(&mut server);

    // "A's socket is killed": A closes its end: the server observes this
    // as a disconnect on its next poll, the same as any ungraceful peer
    // loss, and must detect it through the ordinary read-returns-EOF path
    // rather than a unilateral server-side disconnect.
    a.reactor.disconnect(a.token);
    settle(&mut server);
    assert!(!server.room.contains(a.token.0));

    b.publish("q", b"anything");
    settle(&mut server);
    // No subscribers remain; the publish must not panic or error the room.
    assert_eq!(server.room.len(), 1);
}
