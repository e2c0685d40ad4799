//! Integration-style client tests for tick-socket.
//!
//! Uses the shared `MockConnector` from `tests/common` to play the socket:
//! tests fire transport callbacks by hand and verify what the host observes
//! through `PollingClient`.

mod common;

use std::sync::Arc;

use tick_socket::{ConnectionState, InboundEvent, Payload, TickSocketError};

use common::{connected_client, new_client};

fn text(s: &str) -> InboundEvent {
    InboundEvent::Message {
        payload: Payload::Text(s.into()),
    }
}

fn binary(data: &[u8]) -> InboundEvent {
    InboundEvent::Message {
        payload: Payload::Binary(data.to_vec()),
    }
}

fn transport_error(description: &str) -> InboundEvent {
    InboundEvent::TransportError {
        description: description.into(),
    }
}

// ════════════════════════════════════════════════════════════════════
// State transitions
// ════════════════════════════════════════════════════════════════════

#[test]
fn not_connected_before_connect() {
    let (client, _recorder) = new_client();
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.connection_id().is_none());
}

#[test]
fn connected_after_transport_opens() {
    let (mut client, recorder) = new_client();
    let id = client.connect("ws://localhost:8080/ws").unwrap();

    // The attempt is only initiated; nothing is open yet.
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(client.connection_id(), Some(id));
    assert_eq!(recorder.latest().connection_id(), id);

    recorder.latest().on_open();
    assert!(client.is_connected());
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[test]
fn close_callback_disconnects() {
    let (client, recorder) = connected_client();
    recorder.latest().on_close(Some("server restart".into()));
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn transport_error_does_not_change_state() {
    let (mut client, recorder) = connected_client();
    recorder.latest().on_error("socket hiccup");

    assert!(client.is_connected());
    assert_eq!(client.try_recv(), Some(transport_error("socket hiccup")));
}

#[test]
fn error_while_connecting_keeps_connecting() {
    let (mut client, recorder) = new_client();
    client.connect("ws://localhost:8080/ws").unwrap();
    recorder.latest().on_error("handshake slow");
    assert_eq!(client.state(), ConnectionState::Connecting);

    recorder.latest().on_close(None);
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.try_recv(), Some(transport_error("handshake slow")));
    assert!(client.try_recv().is_none());
}

// ════════════════════════════════════════════════════════════════════
// Synchronous failure
// ════════════════════════════════════════════════════════════════════

#[test]
fn invalid_address_returns_error_without_side_effects() {
    let (mut client, recorder) = new_client();
    let err = client.connect("not-a-valid-address").unwrap_err();

    match err {
        TickSocketError::ConnectInit(description) => {
            assert!(description.contains("not-a-valid-address"));
        }
        other => panic!("expected ConnectInit, got {other:?}"),
    }
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.try_recv().is_none());
    assert!(recorder.events.lock().unwrap().is_empty());
    assert_eq!(
        *recorder.addresses.lock().unwrap(),
        vec!["not-a-valid-address".to_string()]
    );
}

// ════════════════════════════════════════════════════════════════════
// Non-blocking receive and ordering
// ════════════════════════════════════════════════════════════════════

#[test]
fn try_recv_on_empty_queue_returns_none_in_every_state() {
    let (mut client, recorder) = new_client();
    assert!(client.try_recv().is_none());

    client.connect("ws://localhost:8080/ws").unwrap();
    assert!(client.try_recv().is_none());

    recorder.latest().on_open();
    assert!(client.try_recv().is_none());

    client.disconnect().unwrap();
    assert!(client.try_recv().is_none());
}

#[test]
fn events_are_delivered_in_arrival_order() {
    let (mut client, recorder) = connected_client();
    let events = recorder.latest();

    let expected = vec![
        text("one"),
        binary(&[2]),
        transport_error("socket closed"),
        text("three"),
        transport_error("again"),
        binary(&[]),
    ];
    for event in &expected {
        match event.clone() {
            InboundEvent::Message { payload } => events.on_message(payload),
            InboundEvent::TransportError { description } => events.on_error(description),
        }
    }

    let received: Vec<_> = std::iter::from_fn(|| client.try_recv()).collect();
    assert_eq!(received, expected);
    assert!(client.try_recv().is_none());
}

#[test]
fn queue_persists_across_polls() {
    let (mut client, recorder) = connected_client();
    let events = recorder.latest();

    events.on_message(Payload::Text("a".into()));
    assert_eq!(client.try_recv(), Some(text("a")));
    assert!(client.try_recv().is_none());

    events.on_message(Payload::Text("b".into()));
    events.on_message(Payload::Text("c".into()));
    assert_eq!(client.try_recv(), Some(text("b")));
    events.on_message(Payload::Text("d".into()));
    assert_eq!(client.try_recv(), Some(text("c")));
    assert_eq!(client.try_recv(), Some(text("d")));
}

#[test]
fn callbacks_from_another_thread_preserve_order() {
    const COUNT: usize = 5_000;
    let (mut client, recorder) = connected_client();
    let events = recorder.latest();

    let producer = std::thread::spawn(move || {
        for i in 0..COUNT {
            if i % 10 == 0 {
                events.on_error(format!("error {i}"));
            } else {
                events.on_message(Payload::Binary((i as u32).to_le_bytes().to_vec()));
            }
        }
    });

    let mut received = Vec::with_capacity(COUNT);
    while received.len() < COUNT {
        match client.try_recv() {
            Some(event) => received.push(event),
            None => std::thread::yield_now(),
        }
    }
    producer.join().unwrap();

    for (i, event) in received.into_iter().enumerate() {
        let expected = if i % 10 == 0 {
            transport_error(&format!("error {i}"))
        } else {
            binary(&(i as u32).to_le_bytes())
        };
        assert_eq!(event, expected);
    }
}

// ════════════════════════════════════════════════════════════════════
// Payload fidelity
// ════════════════════════════════════════════════════════════════════

#[test]
fn binary_send_is_recorded_verbatim() {
    let (mut client, recorder) = connected_client();
    client.send_binary(&[0x01, 0x02, 0xFF]).unwrap();
    assert_eq!(recorder.sent(), vec![Payload::Binary(vec![0x01, 0x02, 0xFF])]);
}

#[test]
fn text_send_uses_text_path() {
    let (mut client, recorder) = connected_client();
    client.send_text("hello").unwrap();
    assert_eq!(recorder.sent(), vec![Payload::Text("hello".into())]);
}

#[test]
fn send_picks_path_from_payload_kind() {
    let (mut client, recorder) = connected_client();
    client.send(&Payload::Text("hello".into())).unwrap();
    client.send(&Payload::Binary(b"hello".to_vec())).unwrap();
    assert_eq!(
        recorder.sent(),
        vec![
            Payload::Text("hello".into()),
            Payload::Binary(b"hello".to_vec())
        ]
    );
}

#[test]
fn incoming_text_and_binary_keep_their_tags() {
    let (mut client, recorder) = connected_client();
    recorder.latest().on_message(Payload::Text("ping".into()));
    recorder.latest().on_message(Payload::Binary(vec![0x00, 0x10]));

    let first = client.try_recv().unwrap();
    assert!(first.is_text());
    assert_eq!(first, text("ping"));

    let second = client.try_recv().unwrap();
    assert!(!second.is_text());
    assert_eq!(second.into_result(), Ok(Payload::Binary(vec![0x00, 0x10])));
}

// ════════════════════════════════════════════════════════════════════
// Error surfacing
// ════════════════════════════════════════════════════════════════════

#[test]
fn transport_error_appears_in_arrival_position() {
    let (mut client, recorder) = connected_client();
    let events = recorder.latest();
    events.on_message(Payload::Text("before".into()));
    events.on_error("socket closed");
    events.on_message(Payload::Text("after".into()));

    assert_eq!(client.try_recv(), Some(text("before")));
    assert_eq!(client.try_recv(), Some(transport_error("socket closed")));
    assert_eq!(client.try_recv(), Some(text("after")));
}

// ════════════════════════════════════════════════════════════════════
// Misuse
// ════════════════════════════════════════════════════════════════════

#[test]
fn send_before_connect_fails_fast() {
    let (mut client, recorder) = new_client();
    assert!(matches!(
        client.send_text("hi"),
        Err(TickSocketError::NotConnected)
    ));
    assert!(recorder.sent().is_empty());
}

#[test]
fn send_while_connecting_fails_fast() {
    let (mut client, recorder) = new_client();
    client.connect("ws://localhost:8080/ws").unwrap();
    assert!(matches!(
        client.send_binary(&[1, 2, 3]),
        Err(TickSocketError::NotConnected)
    ));
    assert!(recorder.sent().is_empty());
}

#[test]
fn send_after_close_fails_fast() {
    let (mut client, recorder) = connected_client();
    recorder.latest().on_close(None);
    assert!(matches!(
        client.send_text("late"),
        Err(TickSocketError::NotConnected)
    ));
}

// ════════════════════════════════════════════════════════════════════
// Disconnect and reconnect
// ════════════════════════════════════════════════════════════════════

#[test]
fn disconnect_closes_transport_and_keeps_queued_events() {
    let (mut client, recorder) = connected_client();
    recorder.latest().on_message(Payload::Text("queued".into()));

    client.disconnect().unwrap();
    assert_eq!(recorder.closes(), 1);
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.connection_id().is_none());
    assert_eq!(client.try_recv(), Some(text("queued")));
}

#[test]
fn callbacks_after_disconnect_are_ignored() {
    let (mut client, recorder) = connected_client();
    let stale = recorder.latest();
    client.disconnect().unwrap();

    stale.on_message(Payload::Text("ghost".into()));
    stale.on_error("ghost");
    stale.on_open();
    assert!(!stale.is_current());
    assert!(client.try_recv().is_none());
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn reconnect_closes_previous_connection_first() {
    let (mut client, recorder) = connected_client();
    let old = recorder.latest();

    let id = client.connect("ws://localhost:9090/ws").unwrap();
    assert_eq!(recorder.closes(), 1);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_ne!(old.connection_id(), id);

    old.on_message(Payload::Text("old".into()));
    old.on_close(None);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert!(client.try_recv().is_none());

    let new = recorder.latest();
    new.on_open();
    new.on_message(Payload::Text("new".into()));
    assert!(client.is_connected());
    assert_eq!(client.try_recv(), Some(text("new")));
}

#[test]
fn reconnect_after_close_works() {
    let (mut client, recorder) = connected_client();
    recorder.latest().on_close(None);
    assert_eq!(client.state(), ConnectionState::Closed);

    client.connect("ws://localhost:8080/ws").unwrap();
    recorder.latest().on_open();
    assert!(client.is_connected());
    client.send_text("back").unwrap();
    assert_eq!(recorder.sent(), vec![Payload::Text("back".into())]);
}

#[test]
fn dropping_client_closes_transport() {
    let (client, recorder) = connected_client();
    drop(client);
    assert_eq!(recorder.closes(), 1);
}

// ════════════════════════════════════════════════════════════════════
// Independent instances
// ════════════════════════════════════════════════════════════════════

#[test]
fn clients_do_not_share_state() {
    let (mut a, recorder_a) = connected_client();
    let (mut b, recorder_b) = new_client();

    recorder_a.latest().on_message(Payload::Text("for a".into()));
    assert!(a.is_connected());
    assert!(!b.is_connected());
    assert!(b.try_recv().is_none());
    assert_eq!(a.try_recv(), Some(text("for a")));
    assert!(!Arc::ptr_eq(&recorder_a, &recorder_b));
}

#[test]
fn debug_impl_for_client() {
    let (client, _recorder) = connected_client();
    let debug = format!("{client:?}");
    assert!(debug.contains("PollingClient"));
    assert!(debug.contains("Connected"));
}
