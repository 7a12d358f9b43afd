use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::mock_broker::MockBroker;
use crate::client::{Event, EventKind, TopicaClient};
use crate::codec::{DataFrame, Request, Value};
use crate::config::Settings;
use crate::discovery::{LAST_TOPIC_CREATED, REST_PORT_TOPIC, TOPICS_ENDPOINT};
use crate::transport::ConnectionState;
use crate::utils::error::{DiscoveryError, TopicaError};

fn settings_for(port: u16) -> Settings {
    let mut settings = Settings::default();
    settings.broker.host = "127.0.0.1".to_string();
    settings.broker.port = port;
    settings.client.reconnect_interval_ms = 50;
    settings.client.get_timeout_ms = 500;
    settings.client.newtopic_interval_ms = 20;
    settings
}

async fn connected_client(broker: &MockBroker) -> TopicaClient {
    connected_with(settings_for(broker.port())).await
}

async fn connected_with(settings: Settings) -> TopicaClient {
    let client = TopicaClient::new(settings);
    client.connect();
    client
        .wait_until_open(Duration::from_secs(3))
        .await
        .expect("client did not open");
    client
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn counter(client: &TopicaClient, kind: EventKind) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    client.on_event(kind, move |_: &Event| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[tokio::test]
async fn test_get_resolves_once_with_broker_value() {
    let broker = MockBroker::start().await;
    broker.insert("/robot/battery", 87i32);
    let client = connected_client(&broker).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.get("/robot/battery", move |result: Result<Value, TopicaError>| {
        sink.lock().unwrap().push(result.map_err(|e| e.to_string()));
    });

    assert!(wait_for(|| !seen.lock().unwrap().is_empty()).await);
    // an unsolicited frame for the same path must not reach the old callback
    broker.push(&DataFrame::new("/robot/battery", 12i32));
    assert!(wait_for(|| client.cached("/robot/battery").map(|c| c.value) == Some(Value::Int32(12))).await);

    assert_eq!(*seen.lock().unwrap(), vec![Ok(Value::Int32(87))]);
    assert!(!client.has_pending_get("/robot/battery"));
    assert_eq!(
        broker.received(),
        vec![Request::Get {
            path: "/robot/battery".to_string()
        }]
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_get_value_awaits_reply() {
    let broker = MockBroker::start().await;
    broker.insert("/robot/name", "marvin");
    let client = connected_client(&broker).await;

    let value = client.get_value("/robot/name").await.unwrap();
    assert_eq!(value, Value::String("marvin".to_string()));

    client.shutdown().await;
}

#[tokio::test]
async fn test_subscription_fans_out_by_prefix() {
    let broker = MockBroker::start().await;
    let client = connected_client(&broker).await;

    let paths = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&paths);
    client
        .subscribe("/robot", 1000, move |path: &str, _: &Value| {
            sink.lock().unwrap().push(path.to_string());
        })
        .unwrap();
    assert!(wait_for(|| !broker.received().is_empty()).await);
    assert_eq!(
        broker.received()[0],
        Request::Subscribe {
            path: "/robot".to_string(),
            interval_ms: 1000
        }
    );

    for path in ["/robot/a", "/other", "/robot/b/c"] {
        broker.push(&DataFrame::new(path, true));
    }
    assert!(wait_for(|| paths.lock().unwrap().len() == 2).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*paths.lock().unwrap(), vec!["/robot/a", "/robot/b/c"]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_broker_pushes_subscribed_topic_on_interval() {
    let broker = MockBroker::start().await;
    broker.insert("/sensor/temp", 21.5f64);
    let client = connected_client(&broker).await;

    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    client
        .subscribe("/sensor/temp", 20, move |_: &str, value: &Value| {
            assert_eq!(*value, Value::Float64(21.5));
            h.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_for(|| hits.load(Ordering::SeqCst) >= 3).await);
    client.shutdown().await;
}

#[tokio::test]
async fn test_set_reaches_broker_with_variant_type() {
    let broker = MockBroker::start().await;
    let client = connected_client(&broker).await;

    client.set("/motor/speed", 2.5f32).unwrap();
    client.set("/motor/enabled", true).unwrap();
    client.set("/motor/label", "left").unwrap();

    assert!(wait_for(|| broker.value("/motor/label").is_some()).await);
    assert_eq!(broker.value("/motor/speed"), Some(Value::Float32(2.5)));
    assert_eq!(broker.value("/motor/enabled"), Some(Value::Bool(true)));
    assert_eq!(
        broker.value("/motor/label"),
        Some(Value::String("left".to_string()))
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_set_rejects_oversized_path() {
    let broker = MockBroker::start().await;
    let client = connected_client(&broker).await;

    let path = "/".repeat(5000);
    let err = client.set(&path, 1i32).unwrap_err();
    assert!(matches!(err, TopicaError::Codec(_)));

    client.shutdown().await;
    assert!(broker.received().is_empty());
}

#[tokio::test]
async fn test_operations_before_open_write_nothing() {
    let broker = MockBroker::start().await;
    let client = TopicaClient::new(settings_for(broker.port()));

    client.get("/x", |_: Result<Value, TopicaError>| {
        panic!("get callback must not run while closed");
    });
    client.set("/x", 1i32).unwrap();
    client.subscribe("/x", 100, |_: &str, _: &Value| {}).unwrap();

    client.connect();
    client
        .wait_until_open(Duration::from_secs(3))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(broker.received().is_empty());
    assert!(broker.value("/x").is_none());
    client.shutdown().await;
}

#[tokio::test]
async fn test_get_times_out_for_unknown_topic() {
    let broker = MockBroker::start().await;
    let mut settings = settings_for(broker.port());
    settings.client.get_timeout_ms = 100;
    let client = connected_with(settings).await;

    let err = client.get_value("/does/not/exist").await.unwrap_err();
    assert!(matches!(
        err,
        TopicaError::GetTimeout { ref path, timeout_ms: 100 } if path == "/does/not/exist"
    ));
    assert!(!client.has_pending_get("/does/not/exist"));

    client.shutdown().await;
}

#[tokio::test]
async fn test_pending_get_fails_when_connection_drops() {
    let broker = MockBroker::start().await;
    let mut settings = settings_for(broker.port());
    settings.client.get_timeout_ms = 0;
    let client = connected_with(settings).await;

    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    client.get("/never", move |result: Result<Value, TopicaError>| {
        *sink.lock().unwrap() = Some(result);
    });
    assert!(wait_for(|| !broker.received().is_empty()).await);

    broker.drop_connections();
    assert!(wait_for(|| seen.lock().unwrap().is_some()).await);
    assert!(matches!(
        seen.lock().unwrap().take(),
        Some(Err(TopicaError::ConnectionClosed(path))) if path == "/never"
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn test_open_then_reconnect_events() {
    let broker = MockBroker::start().await;
    let client = TopicaClient::new(settings_for(broker.port()));
    let opens = counter(&client, EventKind::Open);
    let reconnects = counter(&client, EventKind::Reconnect);
    let closes = counter(&client, EventKind::Close);

    // re-subscribe from inside the listener, as callers are expected to
    let resubscriber = client.clone();
    client.on_event(EventKind::Reconnect, move |_: &Event| {
        resubscriber
            .subscribe("/robot", 1000, |_: &str, _: &Value| {})
            .unwrap();
    });

    client.connect();
    client.wait_until_open(Duration::from_secs(3)).await.unwrap();
    client.subscribe("/robot", 1000, |_: &str, _: &Value| {}).unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(reconnects.load(Ordering::SeqCst), 0);

    broker.drop_connections();
    assert!(wait_for(|| reconnects.load(Ordering::SeqCst) == 1).await);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(closes.load(Ordering::SeqCst) >= 1);
    assert_eq!(client.state(), ConnectionState::Open);

    let subscribe_count = || {
        broker
            .received()
            .iter()
            .filter(|r| matches!(r, Request::Subscribe { .. }))
            .count()
    };
    assert!(wait_for(|| subscribe_count() == 2).await);

    client.shutdown().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_open_listener_fires_immediately_when_already_open() {
    let broker = MockBroker::start().await;
    let client = connected_client(&broker).await;

    let opens = counter(&client, EventKind::Open);
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let broker = MockBroker::start().await;
    let client = connected_client(&broker).await;

    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    client
        .subscribe("/a", 1000, move |_: &str, _: &Value| {
            h.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    // data header for "/a" followed by an unknown type tag
    broker.push_raw(vec![0x80, 0x02, b'/', b'a', 0x09, 0, 0, 0, 0]);
    broker.push_raw(vec![0x80]);
    broker.push(&DataFrame::new("/a", 1i16));

    assert!(wait_for(|| hits.load(Ordering::SeqCst) == 1).await);
    assert!(client.is_open());

    client.shutdown().await;
}

async fn rest_companion(topics: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOPICS_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(topics))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_get_topics_uses_advertised_rest_port() {
    let rest = rest_companion(&["/robot/a", "/robot/b"]).await;
    let broker = MockBroker::start().await;
    broker.insert(REST_PORT_TOPIC, i32::from(rest.address().port()));
    let client = connected_client(&broker).await;

    let topics = client.get_topics().await.unwrap();
    assert_eq!(topics, vec!["/robot/a", "/robot/b"]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_get_topics_rejects_non_200() {
    let rest = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOPICS_ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .mount(&rest)
        .await;
    let broker = MockBroker::start().await;
    broker.insert(REST_PORT_TOPIC, i32::from(rest.address().port()));
    let client = connected_client(&broker).await;

    let err = client.get_topics().await.unwrap_err();
    assert!(matches!(
        err,
        TopicaError::Discovery(DiscoveryError::Status(503))
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn test_get_topics_fails_without_rest_port() {
    let broker = MockBroker::start().await;
    let mut settings = settings_for(broker.port());
    settings.client.get_timeout_ms = 100;
    let client = connected_with(settings).await;

    let err = client.get_topics().await.unwrap_err();
    assert!(matches!(
        err,
        TopicaError::Discovery(DiscoveryError::PortUnresolved(_))
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn test_newtopic_rediscovers_on_every_meta_topic_arrival() {
    let rest = rest_companion(&["/robot/a", "/robot/b"]).await;
    let broker = MockBroker::start().await;
    broker.insert(REST_PORT_TOPIC, i32::from(rest.address().port()));
    // the value never changes; only its arrival matters
    broker.insert(LAST_TOPIC_CREATED, "/robot/a");
    let client = connected_client(&broker).await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.on_event(EventKind::NewTopic, move |event: &Event| {
        if let Event::NewTopic { topics } = event {
            sink.lock().unwrap().push(topics.clone());
        }
    });

    assert!(wait_for(|| events.lock().unwrap().len() == 1).await);
    assert_eq!(events.lock().unwrap()[0], vec!["/robot/a", "/robot/b"]);

    // repeated arrivals keep querying the REST companion
    tokio::time::sleep(Duration::from_millis(200)).await;
    let listings = rest.received_requests().await.unwrap_or_default().len();
    assert!(listings >= 3, "only {listings} topic listings");
    // an unchanged listing is not announced again
    assert_eq!(events.lock().unwrap().len(), 1);

    rest.reset().await;
    Mock::given(method("GET"))
        .and(path(TOPICS_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(["/robot/a", "/robot/b", "/robot/c"]))
        .mount(&rest)
        .await;

    assert!(wait_for(|| events.lock().unwrap().len() == 2).await);
    assert_eq!(
        events.lock().unwrap()[1],
        vec!["/robot/a", "/robot/b", "/robot/c"]
    );
    assert_eq!(broker.value(LAST_TOPIC_CREATED), Some(Value::from("/robot/a")));

    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_listeners_fire_once_when_registered_during_open() {
    let broker = MockBroker::start().await;
    let client = TopicaClient::new(settings_for(broker.port()));

    let registrar = client.clone();
    let counters = std::thread::spawn(move || {
        (0..300)
            .map(|_| {
                let count = counter(&registrar, EventKind::Open);
                std::thread::yield_now();
                count
            })
            .collect::<Vec<_>>()
    });
    client.connect();

    let counters = tokio::task::spawn_blocking(move || counters.join().unwrap())
        .await
        .unwrap();
    client.wait_until_open(Duration::from_secs(3)).await.unwrap();

    assert!(
        wait_for(|| counters
            .iter()
            .all(|c| c.load(Ordering::SeqCst) == 1))
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));

    client.shutdown().await;
}
