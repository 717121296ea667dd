use crate::common::bits2hr;
use crate::config::{FilterConfig, FilterParams};
use crate::error::Result;
use crate::fpr::FprEstimator;
use crate::hash::base_hashes;
use crate::storage::{BitStorage, InMemoryStorage};
use tracing::{debug, info};

#[cfg(feature = "redis")]
use crate::redis_storage::{ConnectionSource, PooledRedisStorage, RedisStorage};

/// A Bloom filter over any [`BitStorage`].
///
/// Each key is hashed once into a [`HashQuad`](crate::HashQuad); the storage
/// turns it into `k` bit positions. `test` never yields a false negative for
/// a key that was added, but may yield a false positive.
pub struct BloomFilter<S = InMemoryStorage> {
    storage: S,
}

impl BloomFilter<InMemoryStorage> {
    /// In-process filter with `m` bits and `k` hashes, both floored to one.
    pub fn new(m: usize, k: usize) -> Self {
        Self::with_storage(InMemoryStorage::new(FilterParams::new(m, k)))
    }

    /// In-process filter sized for `n` elements at false positive rate `p`.
    pub fn with_estimates(n: usize, p: f64) -> Self {
        Self::with_storage(InMemoryStorage::new(FilterParams::with_estimates(
            n, p,
        )))
    }

    /// In-process filter from a validated [`FilterConfig`].
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_storage(InMemoryStorage::new(FilterParams::from(
            config,
        ))))
    }
}

#[cfg(feature = "redis")]
impl BloomFilter<RedisStorage> {
    /// Filter stored in redis under `key`, driven through `client`.
    ///
    /// With `client == None` construction succeeds and every operation
    /// fails with [`BloomError::NoBackend`](crate::BloomError::NoBackend).
    pub fn redis(
        m: usize,
        k: usize,
        key: impl Into<String>,
        client: Option<redis::Client>,
    ) -> Self {
        Self::with_storage(RedisStorage::new(FilterParams::new(m, k), key, client))
    }

    pub fn redis_with_estimates(
        n: usize,
        p: f64,
        key: impl Into<String>,
        client: Option<redis::Client>,
    ) -> Self {
        Self::with_storage(RedisStorage::new(
            FilterParams::with_estimates(n, p),
            key,
            client,
        ))
    }
}

#[cfg(feature = "redis")]
impl<P: ConnectionSource> BloomFilter<PooledRedisStorage<P>> {
    /// Filter stored in redis under `key`, taking a connection from
    /// `source` for every call.
    pub fn pooled(
        m: usize,
        k: usize,
        key: impl Into<String>,
        source: Option<P>,
    ) -> Self {
        Self::with_storage(PooledRedisStorage::new(
            FilterParams::new(m, k),
            key,
            source,
        ))
    }

    pub fn pooled_with_estimates(
        n: usize,
        p: f64,
        key: impl Into<String>,
        source: Option<P>,
    ) -> Self {
        Self::with_storage(PooledRedisStorage::new(
            FilterParams::with_estimates(n, p),
            key,
            source,
        ))
    }
}

impl<S: BitStorage> BloomFilter<S> {
    pub fn with_storage(storage: S) -> Self {
        info!(
            bit_vector_size = storage.num_bits(),
            num_hashes = storage.num_hashes(),
            size = %bits2hr(storage.num_bits()),
            "Created bloom filter"
        );
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Capacity `m` of the bit array.
    pub fn cap(&self) -> usize {
        self.storage.num_bits()
    }

    /// Number of hash functions `k`.
    pub fn k(&self) -> usize {
        self.storage.num_hashes()
    }

    pub fn add(&self, data: &[u8]) -> Result<()> {
        self.storage.set_all(&base_hashes(data))
    }

    pub fn add_str(&self, data: &str) -> Result<()> {
        self.add(data.as_bytes())
    }

    /// Returns `true` if `data` may be in the set, `false` if it definitely
    /// is not.
    pub fn test(&self, data: &[u8]) -> Result<bool> {
        self.storage.test_all(&base_hashes(data))
    }

    pub fn test_str(&self, data: &str) -> Result<bool> {
        self.test(data.as_bytes())
    }

    /// Atomic `test` followed by `add`; returns the result of the test.
    pub fn test_and_add(&self, data: &[u8]) -> Result<bool> {
        self.storage.test_add_all(&base_hashes(data))
    }

    pub fn test_and_add_str(&self, data: &str) -> Result<bool> {
        self.test_and_add(data.as_bytes())
    }

    /// Removes every key from the filter.
    pub fn clear_all(&self) -> Result<()> {
        debug!(bit_vector_size = self.cap(), "Clearing bloom filter");
        self.storage.clear_all()
    }

    /// Empirical false positive rate with `n` elements inserted.
    ///
    /// Runs [`FprEstimator::default`]: inserts `n` keys, tests 100,000
    /// disjoint keys and counts the positives. The filter is cleared before
    /// and after, so anything previously added is lost.
    pub fn estimate_false_positive_rate(&self, n: u32) -> Result<f64> {
        FprEstimator::default().estimate(self, n)
    }
}

impl<S: BitStorage> std::fmt::Debug for BloomFilter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BloomFilter {{ bit_vector_size: {}, num_hashes: {} }}",
            self.cap(),
            self.k()
        )
    }
}
