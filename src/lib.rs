//! Bloom filter with in-process or Redis-shared bit storage.
//!
//! A Bloom filter answers "possibly present" or "definitely absent" for set
//! membership using `m` bits and `k` hash functions. This crate keeps the
//! bits either in process memory or in a Redis bitmap, so several processes
//! can share one filter by using the same key.
//!
//! HowTo:
//!    * Hashing: every key is hashed once with MurmurHash3 (x64/128, seeds 0
//!      and 1) into four 64 bit values.
//!    * Locations: the `i`-th bit position is derived from those four values
//!      with enhanced double hashing, `h[i % 2] + i * h[2 + ((i + i % 2) % 4) / 2]`,
//!      reduced modulo `m`.
//!    * Sizing: `m = ceil(-n ln p / ln(2)^2)` and `k = ceil(ln 2 * m / n)` for
//!      `n` expected elements at false positive rate `p`.
//!
//! Storage:
//!     * [`InMemoryStorage`]: a bit vector behind a mutex; every call holds
//!       the lock for its whole k-bit loop.
//!     * [`RedisStorage`] / [`PooledRedisStorage`]: the k-bit loop runs as a
//!       Lua script inside Redis, so set / test / test-and-set are atomic
//!       across processes.
//!
//! ```
//! use shared_bloom_rs::BloomFilter;
//!
//! let filter = BloomFilter::new(1000, 4);
//! filter.add_str("Bess").unwrap();
//! assert!(filter.test_str("Bess").unwrap());
//! assert!(!filter.test_and_add_str("Emma").unwrap());
//! assert!(filter.test_str("Emma").unwrap());
//! ```
//!
//! The [`cache`] module holds a small TTL key/value cache with the same
//! local / Redis split; it is independent of the filter.
pub mod cache;
pub mod common;
mod config;
mod error;
mod filter;
pub mod fpr;
mod hash;
#[cfg(feature = "redis")]
pub mod redis_storage;
mod storage;

pub use config::{
    FilterConfig, FilterConfigBuilder, FilterConfigBuilderError, FilterParams,
};
#[cfg(feature = "redis")]
pub use config::{
    DEFAULT_REDIS_TIMEOUT, RedisConfig, RedisConfigBuilder,
    RedisConfigBuilderError,
};
pub use error::{BloomError, Result};
pub use filter::BloomFilter;
pub use fpr::{FprEstimator, FprEstimatorBuilder};
pub use hash::{
    HashQuad, base_hashes, estimate_parameters, location,
    optimal_bit_vector_size, optimal_num_hashes, script_location,
};
#[cfg(feature = "redis")]
pub use redis_storage::{ConnectionSource, PooledRedisStorage, RedisStorage};
pub use storage::{BitStorage, InMemoryStorage};
