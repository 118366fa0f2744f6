//! Drives a whole client lifetime through the public session API: upgrade,
//! toggles, a refused second client, close, and reconnect.

use smart_led::{
    config::SERVER_NAME, ws::AcceptKey, ConnectionState, SessionEngine, SessionIo, TransportEvent,
    Verdict,
};

#[derive(Debug, PartialEq, Eq)]
enum Op {
    Write(Vec<u8>),
    Close,
    Actuate(bool),
}

#[derive(Default)]
struct Wire {
    ops: Vec<Op>,
}

impl SessionIo for Wire {
    fn write(&mut self, bytes: &[u8]) {
        // Coalesce adjacent writes so assertions compare whole messages.
        if let Some(Op::Write(last)) = self.ops.last_mut() {
            last.extend_from_slice(bytes);
        } else {
            self.ops.push(Op::Write(bytes.to_vec()));
        }
    }

    fn close(&mut self) {
        self.ops.push(Op::Close);
    }

    fn actuate(&mut self, on: bool) {
        self.ops.push(Op::Actuate(on));
    }
}

fn upgrade_request(key: &str) -> Vec<u8> {
    format!(
        "GET / HTTP/1.1\r\nhost: led.local\r\nconnection: Upgrade\r\nupgrade: websocket\r\nsec-websocket-key: {key}\r\nsec-websocket-version: 13\r\n\r\n"
    )
    .into_bytes()
}

fn switching_protocols(key: &str) -> Vec<u8> {
    let accept = AcceptKey::derive(key.as_bytes());
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        accept.as_str()
    )
    .into_bytes()
}

fn masked(opcode: u8, value: u8, key: [u8; 4]) -> Vec<u8> {
    vec![0x80 | opcode, 0x81, key[0], key[1], key[2], key[3], value ^ key[0]]
}

#[test]
fn browser_session_lifecycle() {
    let mut engine = SessionEngine::default();
    let mut wire = Wire::default();

    assert_eq!(engine.dispatch(TransportEvent::Accepted, &mut wire), Verdict::Accepted);
    assert_eq!(engine.state(), ConnectionState::Handshaking);

    let key = "x3JJHMbDL1EzLkh9GBhXDw==";
    let request = upgrade_request(key);
    for part in request.chunks(5) {
        engine.dispatch(TransportEvent::Data(part), &mut wire);
    }
    assert_eq!(engine.state(), ConnectionState::Online);
    assert_eq!(wire.ops, [Op::Write(switching_protocols(key))]);
    wire.ops.clear();

    engine.dispatch(TransportEvent::Data(&masked(0x2, 1, [1, 2, 3, 4])), &mut wire);
    assert_eq!(
        wire.ops,
        [Op::Actuate(true), Op::Write(vec![0x82, 0x01, 0x01])]
    );
    wire.ops.clear();

    // A second browser tab is turned away without disturbing the first.
    assert_eq!(engine.dispatch(TransportEvent::Accepted, &mut wire), Verdict::Refused);
    assert!(wire.ops.is_empty());

    engine.dispatch(TransportEvent::Data(&masked(0x8, 0, [9, 9, 9, 9])), &mut wire);
    assert_eq!(wire.ops, [Op::Write(vec![0x88, 0x00]), Op::Close]);
    assert_eq!(engine.state(), ConnectionState::Listening);
    assert!(engine.actuator());
    wire.ops.clear();

    // The next client learns the current state right after the upgrade.
    let key = "dGhlIHNhbXBsZSBub25jZQ==";
    engine.dispatch(TransportEvent::Accepted, &mut wire);
    engine.dispatch(TransportEvent::Data(&upgrade_request(key)), &mut wire);
    let mut expected = switching_protocols(key);
    expected.extend_from_slice(&[0x82, 0x01, 0x01]);
    assert_eq!(wire.ops, [Op::Write(expected)]);
    wire.ops.clear();

    engine.dispatch(TransportEvent::Closed, &mut wire);
    assert_eq!(wire.ops, [Op::Close]);
    assert_eq!(engine.last_error(), None);
}

#[test]
fn plain_http_get_is_rejected_with_server_header() {
    let mut engine = SessionEngine::default();
    let mut wire = Wire::default();
    engine.dispatch(TransportEvent::Accepted, &mut wire);
    engine.dispatch(
        TransportEvent::Data(b"GET / HTTP/1.1\r\nHost: led.local\r\nAccept: */*\r\n\r\n"),
        &mut wire,
    );

    let Op::Write(response) = &wire.ops[0] else {
        panic!("expected a response, got {:?}", wire.ops);
    };
    let response = String::from_utf8(response.clone()).unwrap();
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.contains(&format!("Server: {SERVER_NAME}\r\n")));
    assert_eq!(wire.ops[1], Op::Close);
    assert_eq!(engine.state(), ConnectionState::Listening);
}
