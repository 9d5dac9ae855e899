//! Integration tests for the exchange/topic/queue protocol.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use repubsub::{
    Error, Exchange, ExchangeConfig, PathTest, QueueEvent, SequentialTokens, Subscription,
    TopicPredicate, TopicValue,
};
use repubsub_core::{MessageStore, StorageConfig, StorageEngine};
use serde_json::json;

struct TestContext {
    store: Arc<StorageEngine>,
    exchange: Exchange<StorageEngine>,
}

impl TestContext {
    async fn new() -> Self {
        let store = Arc::new(StorageEngine::open(StorageConfig::temporary()).unwrap());
        let exchange = Exchange::open(store.clone(), ExchangeConfig::new("pubsub_demo"))
            .await
            .unwrap();
        Self { store, exchange }
    }

    async fn subscribe(&self, predicate: TopicPredicate) -> Subscription {
        self.exchange.queue(predicate).subscribe().await.unwrap()
    }
}

/// Assert nothing is pending on `sub` right now.
async fn assert_silent(sub: &mut Subscription) {
    let result = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
    assert!(result.is_err(), "unexpected message: {result:?}");
}

#[tokio::test]
async fn test_upsert_keeps_one_document_per_topic() {
    let ctx = TestContext::new().await;
    let topic = TopicValue::from("weather.ca.mountainview");

    ctx.exchange.publish(topic.clone(), json!({"temp": 70})).await.unwrap();
    ctx.exchange.publish(topic.clone(), json!({"temp": 72})).await.unwrap();

    assert_eq!(ctx.store.count("pubsub_demo").await.unwrap(), 1);
    let doc = ctx.store.fetch("pubsub_demo", &topic).await.unwrap().unwrap();
    assert_eq!(doc.payload, json!({"temp": 72}));
}

#[tokio::test]
async fn test_identical_publishes_each_notify() {
    let ctx = TestContext::new().await;
    let mut sub = ctx.subscribe(TopicPredicate::eq("alerts")).await;
    let topic = ctx.exchange.topic("alerts");

    topic.publish(json!({"level": "high"})).await.unwrap();
    topic.publish(json!({"level": "high"})).await.unwrap();

    let first = sub.recv().await.unwrap();
    let second = sub.recv().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(sub.stats().messages, 2);
    assert_silent(&mut sub).await;
}

#[tokio::test]
async fn test_forced_change_uses_injected_tokens() {
    let store = Arc::new(StorageEngine::open(StorageConfig::temporary()).unwrap());
    let tokens = Arc::new(SequentialTokens::new("pub"));
    let exchange =
        Exchange::open_with_tokens(store.clone(), ExchangeConfig::new("tokens"), tokens.clone())
            .await
            .unwrap();

    let mut feed = store.watch_changes("tokens", None).await.unwrap();
    exchange.publish("t", json!(null)).await.unwrap();
    exchange.publish("t", json!(null)).await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..2 {
        match feed.recv().await.unwrap() {
            repubsub::proto::FeedItem::Change(event) => {
                seen.push(event.new_value.force_change_token.to_string())
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }
    assert_eq!(seen, vec!["pub-1", "pub-2"]);
}

#[tokio::test]
async fn test_regex_scenario() {
    let ctx = TestContext::new().await;
    let mut ca = ctx.subscribe(TopicPredicate::matches(".*ca.*")).await;
    let mut ny = ctx.subscribe(TopicPredicate::matches(".*ny.*")).await;

    ctx.exchange
        .topic("weather.ca.mountainview")
        .publish(json!({"temp": 70}))
        .await
        .unwrap();

    let (topic, payload) = ca.recv().await.unwrap().into_parts();
    assert_eq!(topic, TopicValue::from("weather.ca.mountainview"));
    assert_eq!(payload, json!({"temp": 70}));
    assert_silent(&mut ny).await;
}

#[tokio::test]
async fn test_tags_scenario() {
    let ctx = TestContext::new().await;
    let mut heroes = ctx
        .subscribe(TopicPredicate::contains_all(["fight", "superhero"]))
        .await;
    let mut aliens = ctx
        .subscribe(TopicPredicate::contains_all(["fight", "alien"]))
        .await;

    let payload = json!({"headline": "Batman vs Joker", "round": 1});
    ctx.exchange
        .publish(vec!["superhero", "fight", "supervillain"], payload.clone())
        .await
        .unwrap();

    let message = heroes.recv().await.unwrap();
    assert_eq!(message.topic, TopicValue::tags(["superhero", "fight", "supervillain"]));
    assert_eq!(message.payload, payload);
    assert_silent(&mut aliens).await;
}

#[tokio::test]
async fn test_hierarchical_scenario() {
    let ctx = TestContext::new().await;
    let mut batman = ctx
        .subscribe(TopicPredicate::path(
            ["teamup", "superheroes"],
            PathTest::contains("Batman"),
        ))
        .await;

    let teamup = TopicValue::object(json!({
        "teamup": {"superheroes": ["Batman", "Superman"], "villain": "Lex Luthor"}
    }))
    .unwrap();
    let solo = TopicValue::object(json!({
        "teamup": {"superheroes": ["Wonder Woman"], "villain": "Ares"}
    }))
    .unwrap();

    ctx.exchange.publish(solo, json!({"issue": 1})).await.unwrap();
    ctx.exchange.publish(teamup.clone(), json!({"issue": 2})).await.unwrap();

    let message = batman.recv().await.unwrap();
    assert_eq!(message.topic, teamup);
    assert_eq!(message.payload, json!({"issue": 2}));
}

#[tokio::test]
async fn test_independent_topics_do_not_interfere() {
    let ctx = TestContext::new().await;
    let mut only_b = ctx.subscribe(TopicPredicate::eq("b")).await;

    ctx.exchange.publish("a", json!(1)).await.unwrap();
    ctx.exchange.publish("b", json!(2)).await.unwrap();

    // The first thing delivered is the publish to b; the one to a never arrives.
    assert_eq!(only_b.recv().await.unwrap().payload, json!(2));
    assert_silent(&mut only_b).await;
}

#[tokio::test]
async fn test_payload_is_transparent() {
    let ctx = TestContext::new().await;
    let mut all = ctx.subscribe(TopicPredicate::Any).await;

    let payload = json!({
        "nested": {"list": [1, 2.5, "three", null, true], "empty": {}},
        "unicode": "déjà vu",
        "big": 9007199254740993u64
    });
    ctx.exchange.publish("raw", payload.clone()).await.unwrap();

    assert_eq!(all.recv().await.unwrap().payload, payload);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_same_topic() {
    const PER_PUBLISHER: usize = 50;

    let ctx = TestContext::new().await;
    let mut sub = ctx.subscribe(TopicPredicate::eq("contended")).await;

    let mut handles = Vec::new();
    for publisher in 0..2 {
        let exchange = ctx.exchange.clone();
        handles.push(tokio::spawn(async move {
            let topic = exchange.topic("contended");
            for n in 0..PER_PUBLISHER {
                topic
                    .publish(json!({"publisher": publisher, "n": n}))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut received = 0;
    let mut last = None;
    while received < 2 * PER_PUBLISHER {
        last = Some(sub.recv().await.unwrap());
        received += 1;
    }
    assert_silent(&mut sub).await;

    assert_eq!(ctx.store.count("pubsub_demo").await.unwrap(), 1);
    let stored = ctx
        .store
        .fetch("pubsub_demo", &"contended".into())
        .await
        .unwrap()
        .unwrap();
    // Notifications leave the store in write order, so the last one seen is
    // the value the document converged to.
    assert_eq!(Some(stored.payload), last.map(|m| m.payload));
}

#[tokio::test]
async fn test_predicate_error_is_warning_not_failure() {
    let ctx = TestContext::new().await;
    let mut sub = ctx.subscribe(TopicPredicate::matches("^orders")).await;

    ctx.exchange.publish(vec!["orders"], json!(1)).await.unwrap();
    ctx.exchange.publish("orders.eu", json!(2)).await.unwrap();

    match sub.recv_event().await.unwrap() {
        QueueEvent::Warning(warning) => assert!(warning.reason.contains("matches")),
        other => panic!("expected warning, got {other:?}"),
    }
    assert_eq!(sub.recv().await.unwrap().payload, json!(2));
    assert_eq!(sub.stats().warnings, 1);
}

#[tokio::test]
async fn test_invalid_pattern_reported_per_event() {
    let ctx = TestContext::new().await;
    let mut broken = ctx.subscribe(TopicPredicate::matches("(unclosed")).await;

    ctx.exchange.publish("a", json!(1)).await.unwrap();
    ctx.exchange.publish("b", json!(2)).await.unwrap();

    for _ in 0..2 {
        assert!(matches!(
            broken.recv_event().await.unwrap(),
            QueueEvent::Warning(_)
        ));
    }
    assert!(!broken.is_closed());
}

#[tokio::test]
async fn test_subscriber_misses_earlier_publishes() {
    let ctx = TestContext::new().await;
    ctx.exchange.publish("early", json!("missed")).await.unwrap();

    let mut sub = ctx.subscribe(TopicPredicate::Any).await;
    ctx.exchange.publish("late", json!("seen")).await.unwrap();

    assert_eq!(sub.recv().await.unwrap().payload, json!("seen"));
}

#[tokio::test]
async fn test_store_shutdown_interrupts_streams() {
    let ctx = TestContext::new().await;
    let mut sub = ctx.subscribe(TopicPredicate::Any).await;

    ctx.store.shutdown().await.unwrap();

    assert!(matches!(sub.recv().await, Err(Error::StreamInterrupted(_))));
    assert!(matches!(
        ctx.exchange.publish("a", json!(1)).await,
        Err(Error::StoreUnavailable(_))
    ));
    assert!(matches!(
        ctx.exchange.queue(TopicPredicate::Any).subscribe().await,
        Err(Error::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_close_releases_watcher() {
    let ctx = TestContext::new().await;
    let queue = ctx.exchange.queue(TopicPredicate::Any);

    let mut first = queue.subscribe().await.unwrap();
    let second = queue.subscribe().await.unwrap();
    assert_eq!(ctx.store.feeds().watcher_count(), 2);

    first.close();
    assert_eq!(ctx.store.feeds().watcher_count(), 1);
    assert!(matches!(first.recv().await, Err(Error::SubscriptionClosed)));

    drop(second);
    assert_eq!(ctx.store.feeds().watcher_count(), 0);
}

#[tokio::test]
async fn test_write_rejected_leaves_no_state() {
    let store = Arc::new(
        StorageEngine::open(StorageConfig::temporary().with_max_document_size(256)).unwrap(),
    );
    let exchange = Exchange::open(store.clone(), ExchangeConfig::new("small"))
        .await
        .unwrap();
    let mut sub = exchange.queue(TopicPredicate::Any).subscribe().await.unwrap();

    let err = exchange
        .publish("big", json!({"blob": "x".repeat(1024)}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WriteRejected(_)));
    assert_eq!(store.count("small").await.unwrap(), 0);
    assert_silent(&mut sub).await;
}

#[tokio::test]
async fn test_dyn_store_and_stream_interface() {
    let store: Arc<dyn MessageStore> =
        Arc::new(StorageEngine::open(StorageConfig::temporary()).unwrap());
    let exchange = Exchange::open(store, ExchangeConfig::default()).await.unwrap();

    let mut stream = exchange
        .queue(TopicPredicate::contains_any(["news"]))
        .subscribe()
        .await
        .unwrap();
    exchange.publish(vec!["news", "tech"], json!(1)).await.unwrap();
    exchange.publish(vec!["sports"], json!(2)).await.unwrap();
    exchange.publish(vec!["news"], json!(3)).await.unwrap();

    let payloads: Vec<_> = stream
        .by_ref()
        .take(2)
        .map(|m| m.unwrap().payload)
        .collect()
        .await;
    assert_eq!(payloads, vec![json!(1), json!(3)]);
}
