//! Transport round trip against an in-process WebSocket server.

use std::time::Duration;

use drive_panel::drive::DutyPair;
use drive_panel::messages::OutboundFrame;
use drive_panel::transport::{ConnectionState, Transport, TransportEvent};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport event channel closed")
}

#[tokio::test]
async fn test_round_trip_and_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Device side: push telemetry, report the first command received
    let (received_tx, mut received_rx) = mpsc::unbounded_channel();
    let device = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        socket.send(Message::Text("V8400".to_string())).await.unwrap();
        socket.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
        socket.send(Message::Text("A402,1000".to_string())).await.unwrap();

        while let Some(Ok(message)) = socket.next().await {
            match message {
                Message::Text(text) => received_tx.send(text).unwrap(),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let (transport, mut events) = Transport::connect(format!("ws://{}/", addr));
    assert!(!transport.send(&OutboundFrame::LegacySpeed(5)), "not open yet");

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::State(ConnectionState::Connecting)
    );
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::State(ConnectionState::Open)
    );
    assert_eq!(transport.state(), ConnectionState::Open);

    // Frames arrive in order; the binary message is skipped
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Frame("V8400".to_string())
    );
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Frame("A402,1000".to_string())
    );

    assert!(transport.send(&OutboundFrame::Drive(DutyPair { left: 80, right: 60 })));
    let received = timeout(WAIT, received_rx.recv()).await.unwrap().unwrap();
    assert_eq!(received, "M80:60");

    transport.close();
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::State(ConnectionState::Closed)
    );
    timeout(WAIT, transport.closed()).await.unwrap();
    timeout(WAIT, device).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_peer_close_reports_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Device side: start the closing handshake, report whether it completed
    let device = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        socket.close(None).await.unwrap();
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return false,
            }
        }
    });

    let (transport, mut events) = Transport::connect(format!("ws://{}/", addr));
    let mut states = Vec::new();
    while let Ok(Some(event)) = timeout(WAIT, events.recv()).await {
        if let TransportEvent::State(state) = event {
            states.push(state);
        }
    }

    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closed
        ]
    );
    assert!(!transport.send(&OutboundFrame::LegacySpeed(0)));
    assert!(
        timeout(WAIT, device).await.unwrap().unwrap(),
        "close reply never reached the device"
    );
}

#[tokio::test]
async fn test_dropped_socket_reports_error_then_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Device side: finish the handshake, then vanish without a close frame
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = accept_async(stream).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(socket);
    });

    let (transport, mut events) = Transport::connect(format!("ws://{}/", addr));
    let mut states = Vec::new();
    while let Ok(Some(event)) = timeout(WAIT, events.recv()).await {
        if let TransportEvent::State(state) = event {
            states.push(state);
        }
    }

    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Error,
            ConnectionState::Closed
        ]
    );
    assert_eq!(transport.state(), ConnectionState::Closed);
    assert!(!transport.send(&OutboundFrame::Drive(DutyPair { left: 40, right: 40 })));
}
