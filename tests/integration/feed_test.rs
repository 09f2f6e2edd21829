//! Feed client against a local streamer

use breadboard::fanout::FanoutHub;
use breadboard::feed::{encode_frame, ConnectionState, FeedClient, FeedClientConfig, PricingData};
use breadboard::pipeline::{ingestion_queue, Take};
use breadboard::ws::{FeedTransport, Frame, WsClient, WsConfig, WsError};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

fn frame(symbol: &str, change_percent: f32) -> String {
    encode_frame(&PricingData {
        id: symbol.to_string(),
        price: 100.25,
        time: 1_700_000_000_000,
        change_percent,
        day_volume: 42,
        ..Default::default()
    })
}

/// Accepts connections forever; each session records the subscribe frame,
/// pushes two good frames around a bad one, then closes
async fn streamer(listener: TcpListener, subscribes: mpsc::UnboundedSender<String>) {
    while let Ok((stream, _)) = listener.accept().await {
        let Ok(mut ws) = accept_async(stream).await else {
            continue;
        };
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let _ = subscribes.send(text);
        }
        let _ = ws.send(Message::Text(frame("AAPL", -6.5))).await;
        let _ = ws.send(Message::Text("garbage".to_string())).await;
        let _ = ws.send(Message::Text(frame("MSFT", 0.5))).await;
        let _ = ws.close(None).await;
    }
}

#[tokio::test]
async fn test_feed_client_resubscribes_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sub_tx, mut sub_rx) = mpsc::unbounded_channel();
    tokio::spawn(streamer(listener, sub_tx));

    let transport = Arc::new(WsClient::new(WsConfig::new(format!("ws://{}", addr))));
    let (queue, mut rx) = ingestion_queue(64);
    let client = FeedClient::new(
        transport,
        FeedClientConfig::new(vec!["AAPL".to_string(), "MSFT".to_string()])
            .reconnect_delay(Duration::from_millis(50)),
        queue,
        Arc::new(FanoutHub::default()),
    );
    let state = client.state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(client.run(shutdown_rx));

    for _ in 0..2 {
        let subscribe = timeout(Duration::from_secs(5), sub_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscribe, r#"{"subscribe":["AAPL","MSFT"]}"#);
    }

    let mut symbols = Vec::new();
    for _ in 0..4 {
        match rx.take(Duration::from_secs(5)).await {
            Take::Tick(tick) => symbols.push(tick.symbol),
            other => panic!("expected tick, got {:?}", other),
        }
    }
    assert_eq!(symbols, vec!["AAPL", "MSFT", "AAPL", "MSFT"]);

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_feed_client_backs_off_when_unreachable() {
    // Bind then drop to get a port nothing listens on
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let transport = Arc::new(WsClient::new(WsConfig::new(format!("ws://{}", addr))));
    let (queue, _rx) = ingestion_queue(8);
    let client = FeedClient::new(
        transport,
        FeedClientConfig::new(vec!["AAPL".to_string()]).reconnect_delay(Duration::from_secs(60)),
        queue,
        Arc::new(FanoutHub::default()),
    );
    let mut state = client.state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(client.run(shutdown_rx));

    timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::ErrorBackoff),
    )
    .await
    .unwrap()
    .unwrap();

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

/// Completes the handshake, then never reads, so pings go unanswered
async fn silent_streamer(listener: TcpListener, accepted: mpsc::UnboundedSender<()>) {
    while let Ok((stream, _)) = listener.accept().await {
        let Ok(ws) = accept_async(stream).await else {
            continue;
        };
        let _ = accepted.send(());
        tokio::spawn(async move {
            let _held = ws;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
    }
}

#[tokio::test]
async fn test_missing_pong_fails_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
    tokio::spawn(silent_streamer(listener, accepted_tx));

    let client = WsClient::new(
        WsConfig::new(format!("ws://{}", addr)).ping_interval(Duration::from_millis(100)),
    );
    let mut conn = client.connect().await.unwrap();

    let result = timeout(Duration::from_secs(5), conn.next_frame())
        .await
        .unwrap();
    assert_eq!(result, Err(WsError::PongTimeout));
    assert!(accepted_rx.recv().await.is_some());
}

#[tokio::test]
async fn test_feed_client_backs_off_after_pong_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
    tokio::spawn(silent_streamer(listener, accepted_tx));

    let transport = Arc::new(WsClient::new(
        WsConfig::new(format!("ws://{}", addr)).ping_interval(Duration::from_millis(100)),
    ));
    let (queue, _rx) = ingestion_queue(8);
    let client = FeedClient::new(
        transport,
        FeedClientConfig::new(vec!["AAPL".to_string()]).reconnect_delay(Duration::from_secs(60)),
        queue,
        Arc::new(FanoutHub::default()),
    );
    let mut state = client.state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(client.run(shutdown_rx));

    // The handshake succeeded, so the backoff below comes from the dead keepalive
    timeout(Duration::from_secs(5), accepted_rx.recv())
        .await
        .unwrap()
        .unwrap();
    timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::ErrorBackoff),
    )
    .await
    .unwrap()
    .unwrap();

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_ping_is_answered_with_same_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (pong_tx, pong_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Pong(payload) = msg {
                let _ = pong_tx.send(payload);
                break;
            }
        }
        ws.send(Message::Text(frame("AAPL", 1.0))).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let client = WsClient::new(
        WsConfig::new(format!("ws://{}", addr)).ping_interval(Duration::from_secs(60)),
    );
    let mut conn = client.connect().await.unwrap();

    let next = timeout(Duration::from_secs(5), conn.next_frame())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next, Some(Frame::Text(frame("AAPL", 1.0))));

    let payload = timeout(Duration::from_secs(5), pong_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload, vec![1, 2, 3]);
}
