use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    thread,
    time::Duration,
};

use relay_network::{PollEvent, Reactor};

#[test]
fn tcp_roundtrip() {
    let bind_addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0));
    let mut listener = Reactor::new();
    let listener_token = listener.listen_at(bind_addr).unwrap();
    let addr = listener.local_addr(listener_token).unwrap();

    let server = thread::spawn(move || {
        let mut accepted_stream = None;
        while accepted_stream.is_none() {
            listener
                .poll_once(|event| {
                    if let PollEvent::Accept { stream, .. } = event {
                        accepted_stream = Some(stream);
                    }
                })
                .unwrap();
        }
        let stream_token = accepted_stream.unwrap();

        let mut recv: Option<Vec<u8>> = None;
        while recv.is_none() {
            listener
                .poll_once(|event| {
                    if let PollEvent::Message { token, body } = event {
                        assert_eq!(token, stream_token);
                        recv = Some(body.to_vec());
                    }
                })
                .unwrap();
            thread::sleep(Duration::from_micros(50));
        }
        assert_eq!(recv.unwrap(), b"ping");

        let frame = relay_protocol::encode_frame(b"pong").unwrap();
        listener.send(stream_token, frame);
        for _ in 0..20 {
            listener.poll_once(|_| {}).unwrap();
            thread::sleep(Duration::from_micros(50));
        }
    });

    let client = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        let mut conn = Reactor::new();
        let token = conn.connect(addr).unwrap();
        let frame = relay_protocol::encode_frame(b"ping").unwrap();
        conn.send(token, frame);

        let mut recv: Option<Vec<u8>> = None;
        while recv.is_none() {
            conn.poll_once(|event| {
                if let PollEvent::Message { body, .. } = event {
                    recv = Some(body.to_vec());
                }
            })
            .unwrap();
            thread::sleep(Duration::from_micros(50));
        }
        assert_eq!(recv.unwrap(), b"pong");
    });

    server.join().unwrap();
    client.join().unwrap();
}
