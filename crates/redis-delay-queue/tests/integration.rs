//! Integration tests against a live Redis instance.
//!
//! Requires a running Redis-compatible server. Set REDIS_URL to enable these
//! tests (a bare `host:port`, or a `redis://host:port` URL — the scheme is
//! stripped since this crate dials with `predis://`). Default: none, tests
//! return early when unset.
//!
//! Run with: REDIS_URL=127.0.0.1:6379 cargo test --package redis-delay-queue

use std::collections::HashMap;
use std::time::Duration;

use redis_delay_queue::{Connection, ConnectionError, Options};

fn redis_host_port() -> Option<String> {
    let raw = std::env::var("REDIS_URL").ok()?;
    Some(
        raw.trim_start_matches("redis://")
            .trim_start_matches("predis://")
            .to_string(),
    )
}

fn unique_name(prefix: &str) -> String {
    format!("rdq:test:{prefix}:{}", ulid::Ulid::new())
}

async fn connect(stream: &str, group: &str, consumer: &str) -> Connection {
    let host = redis_host_port().expect("REDIS_URL must be set");
    let options = Options::new(stream, group, vec![host])
        .unwrap()
        .with_consumer(consumer);
    Connection::connect(options).await.unwrap()
}

#[tokio::test]
async fn e1_immediate_round_trip_then_ack_leaves_nothing_behind() {
    if redis_host_port().is_none() {
        return;
    }
    let stream = unique_name("e1");
    let mut conn = connect(&stream, "g", "c").await;

    let mut headers = HashMap::new();
    headers.insert("type".to_string(), "T".to_string());
    conn.add("hello", headers.clone(), 0).await.unwrap();

    let msg = conn.get().await.unwrap().expect("message delivered");
    let envelope = msg.envelope().unwrap();
    assert_eq!(envelope.body, "hello");
    assert_eq!(envelope.headers, headers);

    conn.ack(&msg.id).await.unwrap();
    assert!(conn.get().await.unwrap().is_none());

    conn.cleanup().await.unwrap();
}

#[tokio::test]
async fn e2_delayed_message_is_not_visible_until_due() {
    if redis_host_port().is_none() {
        return;
    }
    let stream = unique_name("e2");
    let mut conn = connect(&stream, "g", "c").await;

    conn.add("later", HashMap::new(), 300).await.unwrap();
    assert!(conn.get().await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let msg = conn.get().await.unwrap().expect("due by now");
    assert_eq!(msg.envelope().unwrap().body, "later");

    conn.cleanup().await.unwrap();
}

#[tokio::test]
async fn delay_monotonicity_orders_two_delayed_entries_by_due_time() {
    if redis_host_port().is_none() {
        return;
    }
    let stream = unique_name("mono");
    let mut conn = connect(&stream, "g", "c").await;

    conn.add("first", HashMap::new(), 50).await.unwrap();
    conn.add("second", HashMap::new(), 400).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;

    let a = conn.get().await.unwrap().expect("first due");
    let b = conn.get().await.unwrap().expect("second due");
    assert_eq!(a.envelope().unwrap().body, "first");
    assert_eq!(b.envelope().unwrap().body, "second");

    conn.cleanup().await.unwrap();
}

#[tokio::test]
async fn e3_abandoned_message_is_reclaimed_by_a_second_consumer() {
    if redis_host_port().is_none() {
        return;
    }
    let stream = unique_name("e3");
    let group = "g";
    let host = redis_host_port().unwrap();

    let mut producer = connect(&stream, group, "producer").await;
    producer.add("orphaned", HashMap::new(), 0).await.unwrap();

    let opts_c1 = Options::new(&stream, group, vec![host.clone()])
        .unwrap()
        .with_consumer("c1")
        .with_redeliver_timeout(Duration::from_secs(1))
        .with_claim_interval(Duration::from_millis(10));
    let mut c1 = Connection::connect(opts_c1).await.unwrap();
    let first = c1.get().await.unwrap().expect("c1 takes the message");

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let opts_c2 = Options::new(&stream, group, vec![host])
        .unwrap()
        .with_consumer("c2")
        .with_redeliver_timeout(Duration::from_secs(1))
        .with_claim_interval(Duration::from_millis(10));
    let mut c2 = Connection::connect(opts_c2).await.unwrap();
    let reclaimed = c2.get().await.unwrap().expect("c2 reclaims it");

    assert_eq!(first.id, reclaimed.id);
    assert_eq!(reclaimed.envelope().unwrap().body, "orphaned");

    c2.ack(&reclaimed.id).await.unwrap();
    c1.cleanup().await.unwrap();
}

#[tokio::test]
async fn e4_setup_absorbs_busygroup_and_rejects_a_second_group_with_delete_after_ack() {
    if redis_host_port().is_none() {
        return;
    }
    let stream = unique_name("e4");
    let host = redis_host_port().unwrap();

    let opts1 = Options::new(&stream, "g1", vec![host.clone()])
        .unwrap()
        .with_auto_setup(false);
    let mut conn1 = Connection::connect(opts1).await.unwrap();
    conn1.setup().await.unwrap();
    // Idempotent: a second setup() on the same group must not error.
    conn1.setup().await.unwrap();

    let opts2 = Options::new(&stream, "g2", vec![host])
        .unwrap()
        .with_auto_setup(false);
    let mut conn2 = Connection::connect(opts2).await.unwrap();
    conn2.setup().await.unwrap();

    // Two groups now exist on the stream; delete_after_ack defaults to true,
    // so the next setup() must refuse.
    let err = conn1.setup().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Logic(_)));

    conn1.cleanup().await.unwrap();
}

#[tokio::test]
async fn e5_approximate_trim_keeps_the_stream_near_max_entries() {
    if redis_host_port().is_none() {
        return;
    }
    let stream = unique_name("e5");
    let host = redis_host_port().unwrap();

    let opts = Options::new(&stream, "g", vec![host])
        .unwrap()
        .with_consumer("c")
        .with_stream_max_entries(10);
    let mut conn = Connection::connect(opts).await.unwrap();

    for _ in 0..1000 {
        conn.add("x", HashMap::new(), 0).await.unwrap();
    }

    let count = conn.get_message_count().await.unwrap();
    assert!(count < 100, "approximate trim left too much slack: {count}");

    conn.cleanup().await.unwrap();
}
