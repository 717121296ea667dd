#![allow(clippy::uninlined_format_args)]
use shared_bloom_rs::{
    BitStorage, BloomFilter, FilterParams, FprEstimatorBuilder, RedisConfig,
    Result, common::bits2hr,
};
use tracing_subscriber::EnvFilter;

// Test configuration
const ROUNDS: u32 = 50_000;
const REDIS_ROUNDS: u32 = 5_000;

fn report<S: BitStorage>(
    backend: &str,
    filter: &BloomFilter<S>,
    capacity: usize,
    target_fpr: f64,
    rounds: u32,
) -> Result<()> {
    let estimator = FprEstimatorBuilder::default()
        .rounds(rounds)
        .build()
        .map_err(|e| shared_bloom_rs::BloomError::InvalidConfig(e.to_string()))?;
    let observed = estimator.estimate(filter, capacity as u32)?;
    println!(
        "{:<9} {:>9} {:>10.2}% {:>12} {:>4} {:>11.3}% {:>+9.1}%",
        backend,
        capacity,
        target_fpr * 100.0,
        bits2hr(filter.cap()),
        filter.k(),
        observed * 100.0,
        (observed - target_fpr) / target_fpr * 100.0,
    );
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Bloom filter false positive rates");
    println!("=================================\n");

    let config = RedisConfig::from_env();
    let reachable = config.client().is_ok_and(|client| {
        client
            .get_connection_with_timeout(config.timeout)
            .and_then(|mut conn| redis::cmd("PING").query::<String>(&mut conn))
            .is_ok()
    });
    if !reachable {
        println!("Redis not reachable at {}, local filters only\n", config.uri);
    }

    println!(
        "{:<9} {:>9} {:>11} {:>12} {:>4} {:>12} {:>10}",
        "Backend", "Capacity", "Target", "Size", "k", "Observed", "Deviation"
    );

    let capacities = [1_000, 10_000, 100_000];
    let target_fprs = [0.01, 0.05, 0.1];

    for &capacity in &capacities {
        for &target_fpr in &target_fprs {
            let filter = BloomFilter::with_estimates(capacity, target_fpr);
            report("inmemory", &filter, capacity, target_fpr, ROUNDS)?;

            if reachable && capacity <= 10_000 {
                let storage = config.storage(
                    &format!("demo_fpr_{}", capacity),
                    FilterParams::with_estimates(capacity, target_fpr),
                )?;
                let filter = BloomFilter::with_storage(storage);
                report("redis", &filter, capacity, target_fpr, REDIS_ROUNDS)?;
            }
        }
    }

    Ok(())
}
