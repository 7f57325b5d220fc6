//! End-to-end tests against a loopback broker thread.

use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use stompprims_client::{connect, ClientError, ConnectionConfig, ReconnectPolicy};
use stompprims_frame::{Command, Frame, FrameReader, FrameWriter};
use stompprims_transport::{TcpTransport, Transport};

const WAIT: Duration = Duration::from_secs(5);

fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    (listener, address)
}

fn config(address: &str) -> ConnectionConfig {
    ConnectionConfig::new(address)
        .with_credentials("guest", "guest")
        .with_protected(false)
        .with_reconnect(ReconnectPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        })
}

/// Accept one client and complete its handshake.
fn accept(listener: &TcpListener, session: &str) -> TcpTransport {
    let (stream, _) = listener.accept().unwrap();
    let transport = TcpTransport::from_stream(stream);
    let connect = FrameReader::new(&transport).read_frame().unwrap();
    assert_eq!(connect.command, Command::Connect);
    FrameWriter::new(&transport)
        .write_frame(
            &Frame::bare(Command::Connected)
                .with_header("session", session)
                .with_header("server", "loopback/1.0"),
        )
        .unwrap();
    transport
}

#[test]
fn subscribe_send_receipt_round_trip() {
    let (listener, address) = listener();
    let (seen_tx, seen_rx) = mpsc::channel();

    let broker = thread::spawn(move || {
        let transport = accept(&listener, "sess-1");
        let reader = FrameReader::new(&transport);
        let mut writer = FrameWriter::new(&transport);

        let subscribe = reader.read_frame().unwrap();
        seen_tx.send(subscribe.clone()).unwrap();

        let send = reader.read_frame().unwrap();
        seen_tx.send(send.clone()).unwrap();
        writer
            .write_frame(
                &Frame::bare(Command::Receipt)
                    .with_header("receipt-id", send.header("receipt").unwrap()),
            )
            .unwrap();
        writer
            .write_frame(
                &Frame::bare(Command::Message)
                    .with_header("destination", "/queue/x")
                    .with_header("message-id", "m-1")
                    .with_header("subscription", subscribe.header("id").unwrap())
                    .with_header("ack", "m-1")
                    .with_body(send.body.clone()),
            )
            .unwrap();

        let ack = reader.read_frame().unwrap();
        seen_tx.send(ack).unwrap();

        let disconnect = reader.read_frame().unwrap();
        writer
            .write_frame(
                &Frame::bare(Command::Receipt)
                    .with_header("receipt-id", disconnect.header("receipt").unwrap()),
            )
            .unwrap();
        seen_tx.send(disconnect).unwrap();
    });

    let conn = connect(config(&address), WAIT).unwrap();
    assert_eq!(conn.session().as_deref(), Some("sess-1"));
    assert_eq!(conn.server_info().as_deref(), Some("loopback/1.0"));

    let (msg_tx, msg_rx) = mpsc::channel();
    conn.on_message(move |msg| {
        let _ = msg_tx.send(msg.clone());
    });

    assert_eq!(conn.subscribe("/queue/x"), 1);
    assert_eq!(conn.send("/queue/x", "hello"), 0);

    let subscribe = seen_rx.recv_timeout(WAIT).unwrap();
    let headers: Vec<_> = subscribe.headers.iter().collect();
    assert_eq!(
        headers,
        vec![("subscription", "/queue/x"), ("id", "1"), ("ack", "auto")]
    );

    let send = seen_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.header("destination"), Some("/queue/x"));
    assert_eq!(send.header("receipt"), Some("0"));
    assert_eq!(send.header("content-length"), Some("5"));
    assert_eq!(send.body.as_ref(), b"hello");

    let message = msg_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(message.body.as_ref(), b"hello");

    let ack = seen_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(ack.command, Command::Ack);
    assert_eq!(ack.header("id"), Some("m-1"));
    assert!(conn.pending_receipts().is_empty());

    conn.disconnect(WAIT).unwrap();
    let disconnect = seen_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(disconnect.command, Command::Disconnect);
    assert_eq!(disconnect.header("receipt"), Some("1"));

    conn.stop();
    conn.join();
    broker.join().unwrap();
}

#[test]
fn reconnects_after_broker_drops_the_link() {
    let (listener, address) = listener();
    let (seen_tx, seen_rx) = mpsc::channel();

    let broker = thread::spawn(move || {
        let first = accept(&listener, "first");
        first.close();
        drop(first);

        let second = accept(&listener, "second");
        let frame = FrameReader::new(&second).read_frame().unwrap();
        seen_tx.send(frame).unwrap();
    });

    let conn = connect(config(&address), WAIT).unwrap();
    let deadline = std::time::Instant::now() + WAIT;
    while conn.session().as_deref() != Some("second") {
        assert!(std::time::Instant::now() < deadline, "never reconnected");
        thread::sleep(Duration::from_millis(5));
    }

    let sent = conn.send("/queue/after", "sent on the new link");
    let frame = seen_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(frame.command, Command::Send);
    assert_eq!(frame.header("receipt"), Some(sent.to_string().as_str()));
    assert_eq!(frame.body.as_ref(), b"sent on the new link");

    conn.stop();
    conn.join();
    broker.join().unwrap();
}

#[test]
fn connect_gives_up_after_timeout() {
    let (listener, address) = listener();
    drop(listener);

    let err = connect(config(&address), Duration::from_millis(200)).unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
}

#[test]
fn protected_connection_over_plain_tcp_never_becomes_ready() {
    let (_listener, address) = listener();
    let err = connect(config(&address).with_protected(true), Duration::from_millis(200))
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
}
