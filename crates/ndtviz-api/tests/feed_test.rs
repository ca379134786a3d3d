#![allow(clippy::unwrap_used)]
// End-to-end tests for `FeedHandle` against a local WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use ndtviz_api::websocket::FeedStatus;
use ndtviz_api::{ControlIntent, FeedHandle, FeedMessage, ReconnectConfig};

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(50),
        max_retries: None,
    }
}

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/socket")).unwrap();
    (listener, url)
}

#[tokio::test]
async fn test_streams_messages_and_sends_intents() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        ws.send(Message::Text("garbage".into())).await.unwrap();
        let frame = json!({ "event": "available_timestamps", "data": { "values": [10, 20, 30] } });
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();

        // First client frame must be the intent.
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(_)) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    });

    let cancel = CancellationToken::new();
    let handle = FeedHandle::connect(url, fast_reconnect(), cancel.clone());
    let mut rx = handle.subscribe();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let FeedMessage::AvailableTimestamps(ts) = msg.as_ref() else {
        panic!("expected timestamps, got {msg:?}");
    };
    assert_eq!(ts.values, [10, 20, 30]);

    handle
        .send(ControlIntent::TimeMachine {
            time_machine_active: true,
        })
        .unwrap();

    let sent = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    let sent: serde_json::Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(
        sent,
        json!({ "event": "timemachine", "data": { "time_machine_active": true } })
    );

    handle.shutdown();
}

#[tokio::test]
async fn test_survives_disconnect() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        for round in 0..2_i64 {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let frame = json!({ "event": "available_timestamps", "data": { "values": [round] } });
            ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            // Drop without a close frame.
            drop(ws);
        }
    });

    let cancel = CancellationToken::new();
    let handle = FeedHandle::connect(url, fast_reconnect(), cancel.clone());
    let mut rx = handle.subscribe();

    let mut seen = Vec::new();
    while seen.len() < 2 {
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let FeedMessage::AvailableTimestamps(ts) = msg.as_ref() {
            seen.extend(ts.values.iter().copied());
        }
    }
    assert_eq!(seen, [0, 1]);

    cancel.cancel();
    server.await.unwrap();

    let mut status = handle.status();
    tokio::time::timeout(Duration::from_secs(5), async {
        while *status.borrow_and_update() != FeedStatus::Closed {
            if status.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .unwrap();
}
