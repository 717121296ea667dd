use crate::error::{BloomError, Result};
use crate::hash::estimate_parameters;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for a filter sized from its expected load.
#[derive(Clone, Debug, Builder, Serialize, Deserialize, PartialEq)]
#[builder(pattern = "owned")]
pub struct FilterConfig {
    /// Expected number of elements
    #[builder(default = "1_000_000")]
    pub capacity: usize,

    /// Target false positive rate (0.0 to 1.0)
    #[builder(default = "0.01")]
    pub false_positive_rate: f64,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(BloomError::InvalidConfig(
                "Capacity must be > 0".into(),
            ));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(BloomError::InvalidConfig(format!(
                "FPR must be between 0 and 1, got {}",
                self.false_positive_rate
            )));
        }
        Ok(())
    }
}

/// Bit vector size `m` and hash count `k` of a filter.
///
/// Both are at least one; a filter never has a zero sized bit array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterParams {
    pub bit_vector_size: usize,
    pub num_hashes: usize,
}

impl FilterParams {
    pub fn new(bit_vector_size: usize, num_hashes: usize) -> Self {
        Self {
            bit_vector_size: bit_vector_size.max(1),
            num_hashes: num_hashes.max(1),
        }
    }

    pub fn with_estimates(capacity: usize, false_positive_rate: f64) -> Self {
        let (m, k) = estimate_parameters(capacity, false_positive_rate);
        Self::new(m, k)
    }
}

impl From<&FilterConfig> for FilterParams {
    fn from(config: &FilterConfig) -> Self {
        Self::with_estimates(config.capacity, config.false_positive_rate)
    }
}

#[cfg(feature = "redis")]
pub use self::redis_config::{
    DEFAULT_REDIS_TIMEOUT, RedisConfig, RedisConfigBuilder,
    RedisConfigBuilderError,
};

#[cfg(feature = "redis")]
mod redis_config {
    use super::FilterParams;
    use crate::cache::RedisCache;
    use crate::error::{BloomError, Result};
    use crate::redis_storage::RedisStorage;
    use derive_builder::Builder;
    use std::time::Duration;

    /// Bound on connecting, reading and writing for every redis call.
    pub const DEFAULT_REDIS_TIMEOUT: Duration = Duration::from_secs(5);

    /// Where remote filters and caches live.
    #[derive(Builder, Clone, Debug)]
    #[builder(pattern = "owned")]
    pub struct RedisConfig {
        #[builder(default = "\"redis://127.0.0.1/\".to_string()")]
        pub uri: String,
        /// Prepended to every filter name to build its redis key
        #[builder(default = "\"bloom\".to_string()")]
        pub key_prefix: String,
        /// Connect, read and write timeout of each connection
        #[builder(default = "DEFAULT_REDIS_TIMEOUT")]
        pub timeout: Duration,
    }

    impl RedisConfig {
        /// Read `REDIS_URI`, `BLOOM_KEY_PREFIX` and `REDIS_TIMEOUT_MS`,
        /// loading `.env` first.
        pub fn from_env() -> Self {
            dotenvy::dotenv().ok();

            let timeout = std::env::var("REDIS_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map_or(DEFAULT_REDIS_TIMEOUT, Duration::from_millis);

            Self {
                uri: std::env::var("REDIS_URI")
                    .unwrap_or_else(|_| "redis://127.0.0.1/".to_string()),
                key_prefix: std::env::var("BLOOM_KEY_PREFIX")
                    .unwrap_or_else(|_| "bloom".to_string()),
                timeout,
            }
        }

        /// Open a client. No connection is made until first use.
        pub fn client(&self) -> Result<redis::Client> {
            redis::Client::open(self.uri.as_str()).map_err(|e| {
                BloomError::InvalidConfig(format!(
                    "Invalid redis uri '{}': {}",
                    self.uri, e
                ))
            })
        }

        pub fn filter_key(&self, name: &str) -> String {
            format!("{}:{}", self.key_prefix, name)
        }

        /// Remote bit storage for filter `name`, with this config's timeout.
        pub fn storage(
            &self,
            name: &str,
            params: FilterParams,
        ) -> Result<RedisStorage> {
            Ok(RedisStorage::new(params, self.filter_key(name), Some(self.client()?))
                .with_timeout(self.timeout))
        }

        /// Remote cache with this config's timeout.
        pub fn cache(&self) -> Result<RedisCache> {
            Ok(RedisCache::new(Some(self.client()?)).with_timeout(self.timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_floor_to_one() {
        let params = FilterParams::new(0, 0);
        assert_eq!(params.bit_vector_size, 1);
        assert_eq!(params.num_hashes, 1);
    }

    #[test]
    fn test_params_from_config() {
        let config = FilterConfigBuilder::default()
            .capacity(1000)
            .false_positive_rate(0.01)
            .build()
            .expect("Unable to build FilterConfig");

        let params = FilterParams::from(&config);
        assert_eq!(params, FilterParams::new(9586, 7));
    }

    #[test]
    fn test_params_with_degenerate_estimates() {
        let params = FilterParams::with_estimates(0, 0.01);
        assert_eq!(params, FilterParams::new(1, 1));
    }

    #[test]
    fn test_config_defaults() {
        let config = FilterConfigBuilder::default()
            .build()
            .expect("Defaults should build");
        assert_eq!(config.capacity, 1_000_000);
        assert_eq!(config.false_positive_rate, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero = FilterConfigBuilder::default().capacity(0).build().unwrap();
        assert!(matches!(zero.validate(), Err(BloomError::InvalidConfig(_))));

        for fpr in [0.0, 1.0, -0.1, 1.1, f64::NAN] {
            let config = FilterConfigBuilder::default()
                .false_positive_rate(fpr)
                .build()
                .unwrap();
            assert!(
                config.validate().is_err(),
                "FPR {} should fail validation",
                fpr
            );
        }
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = FilterConfigBuilder::default()
            .capacity(5000)
            .false_positive_rate(0.02)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let restored: FilterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_config() {
        let config = RedisConfigBuilder::default()
            .key_prefix("dedup".to_string())
            .build()
            .unwrap();
        assert_eq!(config.uri, "redis://127.0.0.1/");
        assert_eq!(config.timeout, DEFAULT_REDIS_TIMEOUT);
        assert_eq!(config.filter_key("urls"), "dedup:urls");
        assert!(config.client().is_ok());

        let bad = RedisConfigBuilder::default()
            .uri("not a uri".to_string())
            .build()
            .unwrap();
        assert!(matches!(bad.client(), Err(BloomError::InvalidConfig(_))));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_config_timeout_reaches_backends() {
        let config = RedisConfigBuilder::default()
            .timeout(std::time::Duration::from_millis(250))
            .build()
            .unwrap();

        let storage = config.storage("urls", FilterParams::new(100, 3)).unwrap();
        assert_eq!(storage.key(), "bloom:urls");
        assert_eq!(storage.timeout(), std::time::Duration::from_millis(250));

        let cache = config.cache().unwrap();
        assert_eq!(cache.timeout(), std::time::Duration::from_millis(250));
    }
}
