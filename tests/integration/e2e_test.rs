//! End-to-end integration tests for the HTTP surface

use breadboard::config::Config;
use breadboard::fanout::{router, FanoutHub, FeedEvent, ServerState};
use breadboard::feed::{ConnectionState, Tick};
use breadboard::pipeline::ingestion_queue;
use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

#[test]
fn test_config_example_is_valid() {
    let config = Config::parse(include_str!("../../config.toml.example")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.feed.symbols.len(), 15);
}

async fn start_server(hub: Arc<FanoutHub>) -> (SocketAddr, watch::Sender<ConnectionState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (queue, _rx) = ingestion_queue(16);
    let (state_tx, feed_state) = watch::channel(ConnectionState::Subscribed);
    let app = router(ServerState {
        hub,
        queue,
        feed_state,
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state_tx)
}

async fn wait_for_subscribers(hub: &FanoutHub, n: usize) {
    timeout(Duration::from_secs(5), async {
        while hub.subscriber_count().await < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_websocket_subscriber_receives_events() {
    let hub = Arc::new(FanoutHub::new(16));
    let (addr, _state) = start_server(hub.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/realtime", addr))
        .await
        .unwrap();
    wait_for_subscribers(&hub, 1).await;

    let tick = Tick {
        symbol: "BTC-USD".to_string(),
        price: dec!(64000.5),
        volume: 0,
        change_percent: dec!(1.25),
        timestamp_ms: 1_700_000_000_000,
    };
    assert_eq!(hub.broadcast(&FeedEvent::PriceUpdate(tick)).await, 1);

    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    assert_eq!(json["type"], "price_update");
    assert_eq!(json["data"]["symbol"], "BTC-USD");

    ws.send(Message::Text("ping".to_string())).await.unwrap();
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(msg.to_text().unwrap(), r#"{"type":"pong"}"#);

    ws.close(None).await.unwrap();
    wait_for_subscribers_to_leave(&hub).await;
}

async fn wait_for_subscribers_to_leave(hub: &FanoutHub) {
    timeout(Duration::from_secs(5), async {
        while hub.subscriber_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_health_endpoint() {
    let hub = Arc::new(FanoutHub::new(16));
    let (addr, _state) = start_server(hub).await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue_capacity"], 16);
    assert_eq!(body["queue_size"], 0);
    assert_eq!(body["websocket_clients"], 0);
    assert_eq!(body["feed_state"], "subscribed");
}
