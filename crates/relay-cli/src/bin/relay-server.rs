use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use relay::Room;
use relay_network::{ConnState, PollEvent, Reactor, Token};

/// relay pub/sub broker.
#[derive(Parser)]
#[command(name = "server")]
struct Args {
    /// TCP port to listen on, on all interfaces.
    port: u16,
}

/// An event observed during one `poll_once` call, decoded eagerly since
/// the borrowed `Message` body only lives for the duration of the
/// handler closure; actual room mutation and any reply happen here,
/// after `poll_once` has returned and the reactor is free to re-borrow.
enum Pending {
    Accept(Token),
    Disconnect(Token),
    Message(Token, relay::ClientMessage),
}

fn main() -> ExitCode {
    relay_cli::logging::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let bind_addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port));
    let mut reactor = Reactor::new();
    if let Err(err) = reactor.listen_at(bind_addr) {
        tracing::error!(%err, "failed to bind listening endpoint");
        return ExitCode::FAILURE;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(err) = ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed)) {
            tracing::warn!(%err, "failed to install Ctrl-C handler, shutdown must be forced");
        }
    }

    let mut room = Room::new();

    while !shutdown.load(Ordering::Relaxed) {
        let mut pending = Vec::new();
        if let Err(err) = reactor.poll_once(|event| {
            pending.push(match event {
                PollEvent::Accept { stream, .. } => Pending::Accept(stream),
                PollEvent::Disconnect { token } => Pending::Disconnect(token),
                PollEvent::Message { token, body } => {
                    Pending::Message(token, relay_protocol::decode_client(body))
                }
            });
        }) {
            tracing::error!(%err, "reactor poll failed");
            return ExitCode::FAILURE;
        }

        for item in pending {
            match item {
                Pending::Accept(token) => room.join(token.0),
                Pending::Disconnect(token) => room.leave(token.0),
                Pending::Message(token, msg) => dispatch(&mut reactor, &mut room, token, msg),
            }
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    ExitCode::SUCCESS
}

fn dispatch(reactor: &mut Reactor, room: &mut Room, token: Token, msg: relay::ClientMessage) {
    let Some(delivery) = room.handle_message(token.0, msg) else {
        return;
    };

    let frame = match relay_protocol::encode_server_deliver(&delivery.topic, &delivery.data) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(%err, topic = %delivery.topic, "suppressing delivery, encoded body too large");
            return;
        }
    };

    for target in delivery.targets {
        tracing::info!(
            "The server is sending data \"{}\" with the topic \"{}\" to a client.",
            String::from_utf8_lossy(&delivery.data),
            delivery.topic,
        );
        if reactor.send(Token(target), frame.clone()) == ConnState::Disconnected {
            room.leave(target);
        }
    }
}
