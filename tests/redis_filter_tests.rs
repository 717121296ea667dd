//! Tests marked `#[ignore]` need a running redis server (`REDIS_URI`,
//! default `redis://127.0.0.1/`); run them with `cargo test -- --ignored`.
mod common;

use common::test_utils::{TestKey, generate_test_items, init_tracing, live_redis};
use shared_bloom_rs::{BloomError, BloomFilter, FprEstimatorBuilder};
use std::thread;

#[test]
#[ignore = "needs a redis server"]
fn test_redis_add_and_test() {
    init_tracing();
    let client = live_redis();
    let key = TestKey::new("add_and_test", Some(client.clone()));
    let filter = BloomFilter::redis(1000, 4, key.key(), Some(client));

    filter.add_str("Bess").unwrap();
    filter.add_str("Jane").unwrap();
    assert!(filter.test_str("Bess").unwrap());
    assert!(filter.test_str("Jane").unwrap());
    assert!(!filter.test_str("Emma").unwrap());

    assert!(!filter.test_and_add_str("Emma").unwrap());
    assert!(filter.test_str("Emma").unwrap());

    filter.clear_all().unwrap();
    assert!(!filter.test_str("Bess").unwrap());
}

#[test]
#[ignore = "needs a redis server"]
fn test_pooled_add_and_test() {
    init_tracing();
    let client = live_redis();
    let key = TestKey::new("pooled", Some(client.clone()));
    let source = move || client.get_connection().ok();
    let filter = BloomFilter::pooled_with_estimates(1000, 0.01, key.key(), Some(source));

    let items = generate_test_items(200);
    for item in &items {
        filter.add(item).unwrap();
    }
    for item in &items {
        assert!(filter.test(item).unwrap(), "False negative over pooled redis");
    }
}

#[test]
#[ignore = "needs a redis server"]
fn test_bindings_share_one_bitmap() {
    let client = live_redis();
    let key = TestKey::new("shared", Some(client.clone()));

    let direct = BloomFilter::redis(5000, 5, key.key(), Some(client.clone()));
    let source = move || client.get_connection().ok();
    let pooled = BloomFilter::pooled(5000, 5, key.key(), Some(source));

    for item in generate_test_items(50) {
        direct.add(&item).unwrap();
        assert!(pooled.test(&item).unwrap());
    }
    assert!(!direct.test_and_add_str("late").unwrap());
    assert!(pooled.test_and_add_str("late").unwrap());
}

#[test]
#[ignore = "needs a redis server"]
fn test_redis_single_winner_across_filters() {
    let client = live_redis();
    let key = TestKey::new("winner", Some(client.clone()));
    let name = key.key().to_string();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let filter = BloomFilter::redis(1000, 7, name.clone(), Some(client.clone()));
            thread::spawn(move || filter.test_and_add_str("contended").unwrap())
        })
        .collect();
    let seen_before: Vec<bool> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(seen_before.iter().filter(|seen| !**seen).count(), 1);
}

#[test]
#[ignore = "needs a redis server"]
fn test_redis_false_positive_estimate() {
    let client = live_redis();
    let key = TestKey::new("fpr", Some(client.clone()));
    let filter =
        BloomFilter::redis_with_estimates(1000, 0.01, key.key(), Some(client));
    let estimator = FprEstimatorBuilder::default()
        .rounds(5_000u32)
        .max_in_flight(16usize)
        .build()
        .unwrap();

    let rate = estimator.estimate(&filter, 1000).unwrap();
    assert!(rate <= 0.02, "Estimated rate too high: {}", rate);
    assert!(!filter.test_str("anything").unwrap());
}

#[test]
fn test_without_client_every_call_fails() {
    let filter = BloomFilter::redis(1000, 4, "test:no_client", None);
    assert!(matches!(filter.add_str("x"), Err(BloomError::NoBackend)));
    assert!(matches!(filter.test_str("x"), Err(BloomError::NoBackend)));
    assert!(matches!(
        filter.estimate_false_positive_rate(10),
        Err(BloomError::NoBackend)
    ));
}
