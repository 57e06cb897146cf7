use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use relay_network::{ConnState, Reactor};

/// `send` to a token that has already been torn down must report
/// `Disconnected` rather than silently no-op, so a caller tracking
/// membership (like a `Room`) learns the session is gone even though no
/// `PollEvent::Disconnect` was ever delivered for it.
#[test]
fn send_to_a_disconnected_token_reports_disconnected() {
    let mut reactor = Reactor::new();
    let listener = reactor
        .listen_at(SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0)))
        .unwrap();
    let addr = reactor.local_addr(listener).unwrap();

    let token = reactor.connect(addr).unwrap();
    reactor.disconnect(token);

    let frame = relay_protocol::encode_frame(b"late").unwrap();
    assert_eq!(reactor.send(token, frame), ConnState::Disconnected);
}
