//! Integration tests for buffering while disconnected
//!
//! Every operation issued before `connect()` succeeds must reach the broker
//! exactly once, in call order, right after CONNECTED.

mod common;

use common::{next_state, BrokerOptions, MockStompBroker};
use std::time::Duration;
use stompsockets::protocol::Command;
use stompsockets::{ConnectionState, StompClient, StompError, StompMessage};

async fn client_for(broker: &MockStompBroker) -> StompClient {
    stompsockets::builder()
        .url(broker.sockjs_url())
        .sockjs(false)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_buffered_sends_are_flushed_in_order() {
    let broker = MockStompBroker::start().await;
    let client = client_for(&broker).await;

    client.send("a", &1).unwrap();
    client.send("a", &2).unwrap();
    assert_eq!(client.metrics().await.pending, 2);

    client.connect().await.unwrap();

    broker.expect(Command::Connect).await;
    let first = broker.expect(Command::Send).await;
    let second = broker.expect(Command::Send).await;
    assert_eq!(first.get_header("destination"), Some("a"));
    assert_eq!(first.body, "1");
    assert_eq!(second.get_header("destination"), Some("a"));
    assert_eq!(second.body, "2");

    assert_eq!(client.metrics().await.pending, 0);
    client.shutdown().await.unwrap();
}

// Callbacks are checked with a blocking receive, so the session needs its own worker
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_buffered_subscriptions_are_replayed_in_call_order() {
    let broker = MockStompBroker::start().await;
    let client = client_for(&broker).await;
    let (tx, rx) = crossbeam_channel::unbounded();

    let id = client
        .subscribe("/topic/chat", move |msg: StompMessage| {
            let _ = tx.send(msg.json::<String>().unwrap());
        })
        .unwrap();
    client.send("/topic/chat", "hello").unwrap();

    client.connect().await.unwrap();

    broker.expect(Command::Connect).await;
    let subscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(subscribe.get_header("id"), Some(id.as_str()));
    assert_eq!(subscribe.get_header("destination"), Some("/topic/chat"));
    let send = broker.expect(Command::Send).await;
    assert_eq!(send.body, "\"hello\"");
    assert_eq!(send.get_header("content-type"), Some("application/json"));

    // The subscription was live before the message was published
    let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(received, "hello");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_while_connected_is_not_buffered() {
    let broker = MockStompBroker::start().await;
    let client = client_for(&broker).await;
    client.connect().await.unwrap();
    broker.expect(Command::Connect).await;

    client.subscribe("/topic/live", |_msg: StompMessage| {}).unwrap();

    let metrics = client.metrics().await;
    assert_eq!(metrics.pending, 0);
    assert_eq!(metrics.active_subscriptions, 1);
    broker.expect(Command::Subscribe).await;

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribed_buffered_subscription_never_reaches_broker() {
    let broker = MockStompBroker::start().await;
    let client = client_for(&broker).await;

    let id = client.subscribe("/topic/gone", |_msg: StompMessage| {}).unwrap();
    client.unsubscribe(&id).unwrap();
    client.send("/app/x", &serde_json::json!({ "k": 1 })).unwrap();
    assert_eq!(client.metrics().await.pending, 1);

    client.connect().await.unwrap();
    broker.expect(Command::Connect).await;
    let send = broker.expect(Command::Send).await;
    assert_eq!(send.body, "{\"k\":1}");
    broker.expect_silence(Duration::from_millis(200)).await;

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_operations_after_disconnect_are_buffered_again() {
    let broker = MockStompBroker::start().await;
    let client = client_for(&broker).await;

    client.connect().await.unwrap();
    broker.expect(Command::Connect).await;
    client.disconnect().await.unwrap();
    broker.expect(Command::Disconnect).await;

    client.send("/app/later", &"queued").unwrap();
    assert_eq!(client.metrics().await.pending, 1);
    broker.expect_silence(Duration::from_millis(200)).await;

    client.connect().await.unwrap();
    broker.expect(Command::Connect).await;
    let send = broker.expect(Command::Send).await;
    assert_eq!(send.get_header("destination"), Some("/app/later"));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_connect_keeps_buffer_and_state() {
    let broker = MockStompBroker::start_with(BrokerOptions {
        reject_connect: true,
        ..Default::default()
    })
    .await;
    let client = client_for(&broker).await;
    let mut states = client.state_changes();

    client.send("/app/x", &42).unwrap();
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, StompError::Handshake(_)), "got {:?}", err);

    assert!(!client.is_connected());
    assert_eq!(client.metrics().await.pending, 1);
    assert!(states.try_recv().is_err(), "no state event on failed connect");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connect_to_unreachable_endpoint_fails() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = stompsockets::builder()
        .url(format!("ws://{}", addr))
        .sockjs(false)
        .build()
        .await
        .unwrap();

    client.send("/app/x", &1).unwrap();
    assert!(matches!(
        client.connect().await,
        Err(StompError::WebSocket(_))
    ));
    assert!(!client.is_connected());
    assert_eq!(client.metrics().await.pending, 1);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_many_buffered_operations_keep_fifo_order() {
    let broker = MockStompBroker::start().await;
    let client = client_for(&broker).await;
    let mut states = client.state_changes();

    for i in 0..50 {
        if i % 10 == 0 {
            client.subscribe(format!("/topic/{}", i), |_m: StompMessage| {}).unwrap();
        }
        client.send("/app/seq", &i).unwrap();
    }

    client.connect().await.unwrap();
    assert!(next_state(&mut states).await);
    broker.expect(Command::Connect).await;

    let mut sends = Vec::new();
    let mut subscribes = 0;
    for i in 0..55 {
        let frame = broker.next_frame().await;
        match frame.command {
            Command::Subscribe => {
                subscribes += 1;
                // Every subscribe precedes the send issued right after it
                let expected = format!("/topic/{}", sends.len());
                assert_eq!(frame.get_header("destination"), Some(expected.as_str()), "frame {}", i);
            }
            Command::Send => sends.push(frame.body.parse::<u32>().unwrap()),
            other => panic!("unexpected {}", other),
        }
    }

    assert_eq!(subscribes, 5);
    assert_eq!(sends, (0..50).collect::<Vec<_>>());
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_operations_during_handshake_follow_the_buffered_ones() {
    let broker = MockStompBroker::start_with(BrokerOptions {
        connected_delay: Some(Duration::from_millis(300)),
        ..Default::default()
    })
    .await;
    let client = client_for(&broker).await;

    client.send("/app/seq", &1).unwrap();

    let (result, _) = tokio::join!(client.connect(), async {
        while client.connection_state() != ConnectionState::Connecting {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        client.send("/app/seq", &2).unwrap();
        client.subscribe("/topic/late", |_m: StompMessage| {}).unwrap();
        assert_eq!(client.metrics().await.pending, 3);
    });
    result.unwrap();

    broker.expect(Command::Connect).await;
    assert_eq!(broker.expect(Command::Send).await.body, "1");
    assert_eq!(broker.expect(Command::Send).await.body, "2");
    let subscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(subscribe.get_header("destination"), Some("/topic/late"));
    assert_eq!(client.metrics().await.pending, 0);

    client.shutdown().await.unwrap();
}
