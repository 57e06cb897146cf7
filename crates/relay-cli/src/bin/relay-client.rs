use std::{
    io::{self, BufRead},
    net::{IpAddr, Ipv4Addr, SocketAddr},
    process::ExitCode,
    sync::mpsc::{self, TryRecvError},
    thread,
    time::Duration,
};

use relay_cli::command::{self, Command};
use relay_network::{ConnState, PollEvent, Reactor, Token};

fn main() -> ExitCode {
    relay_cli::logging::init();

    let (tx, rx) = mpsc::channel::<Command>();

    // A dedicated thread reads stdin so a slow or blocked write never stalls
    // command input, and an incoming delivery can print without waiting on
    // the user.
    let input_thread = thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match command::parse_line(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
        }
        // `tx` is dropped here on EOF, which the reactor loop below reads
        // as a request for graceful shutdown.
    });

    let mut reactor = Reactor::new();
    let mut conn: Option<Token> = None;

    loop {
        match rx.try_recv() {
            Ok(cmd) => handle_command(&mut reactor, &mut conn, cmd),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        if conn.is_some() {
            let _ = reactor.poll_once(|event| {
                if let PollEvent::Message { body, .. } = event {
                    match relay_protocol::decode_server_deliver(body) {
                        Ok(delivery) => println!(
                            "[Message] Topic: {} Data: {}",
                            delivery.topic,
                            String::from_utf8_lossy(&delivery.data),
                        ),
                        Err(err) => eprintln!("{err}"),
                    }
                }
            });
        }

        thread::sleep(Duration::from_millis(1));
    }

    let _ = input_thread.join();
    ExitCode::SUCCESS
}

fn handle_command(reactor: &mut Reactor, conn: &mut Option<Token>, cmd: Command) {
    match cmd {
        Command::Connect { port, name: _ } => {
            let addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), port));
            match reactor.connect(addr) {
                Ok(token) => *conn = Some(token),
                Err(err) => eprintln!("failed to connect to 127.0.0.1:{port}: {err}"),
            }
        }
        Command::Disconnect => {
            if let Some(token) = conn.take() {
                reactor.disconnect(token);
            }
        }
        Command::Subscribe { topic } => send_or_warn(reactor, conn, relay_protocol::encode_subscribe(&topic)),
        Command::Unsubscribe { topic } => {
            send_or_warn(reactor, conn, relay_protocol::encode_unsubscribe(&topic));
        }
        Command::Publish { topic, data } => {
            send_or_warn(reactor, conn, relay_protocol::encode_publish(&topic, data.as_bytes()));
        }
    }
}

fn send_or_warn(
    reactor: &mut Reactor,
    conn: &mut Option<Token>,
    frame: Result<Vec<u8>, relay_protocol::FrameError>,
) {
    let Some(token) = *conn else {
        eprintln!("not connected");
        return;
    };
    match frame {
        Ok(frame) => {
            if reactor.send(token, frame) == ConnState::Disconnected {
                *conn = None;
            }
        }
        Err(err) => eprintln!("{err}"),
    }
}
