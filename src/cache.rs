//! Key/value cache with jittered time-to-live.
//!
//! Lives next to the Bloom filter but shares nothing with it except the
//! error type. Two stores implement [`CacheStore`]:
//!
//! * [`LocalCache`]: a mutex-guarded map with sliding expiry and an optional
//!   background sweeper.
//! * [`RedisCache`]: a redis hash per key, read and written through Lua
//!   scripts.
//!
//! Every TTL of `t > 0` seconds is stretched by a random `0..=t/10` seconds
//! so that entries written together do not all expire together. The random
//! source is passed in explicitly.
pub mod local;
#[cfg(feature = "redis")]
pub mod remote;

pub use local::{LocalCache, SweeperHandle};
#[cfg(feature = "redis")]
pub use remote::RedisCache;

use crate::error::{BloomError, Result};
use rand::Rng;

/// A value stored in a cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl CacheValue {
    fn text(&self) -> Option<&str> {
        match self {
            CacheValue::Str(s) => Some(s),
            CacheValue::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            CacheValue::Int(i) => Ok(*i),
            other => other
                .text()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| BloomError::data_type("integer", other)),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            CacheValue::Float(f) => Ok(*f),
            CacheValue::Int(i) => Ok(*i as f64),
            other => other
                .text()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| BloomError::data_type("float", other)),
        }
    }

    pub fn as_string(&self) -> Result<String> {
        self.text()
            .map(str::to_owned)
            .ok_or_else(|| BloomError::data_type("string", self))
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        match self {
            CacheValue::Str(s) => Ok(s.clone().into_bytes()),
            CacheValue::Bytes(b) => Ok(b.clone()),
            other => Err(BloomError::data_type("bytes", other)),
        }
    }

    /// Booleans, the integers/floats `1` and `0`, or one of the texts
    /// `1 t T true TRUE True` / `0 f F false FALSE False`.
    pub fn as_bool(&self) -> Result<bool> {
        let parsed = match self {
            CacheValue::Bool(b) => Some(*b),
            CacheValue::Int(1) => Some(true),
            CacheValue::Int(0) => Some(false),
            CacheValue::Float(f) if *f == 1.0 => Some(true),
            CacheValue::Float(f) if *f == 0.0 => Some(false),
            other => other.text().and_then(|s| match s {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
                _ => None,
            }),
        };
        parsed.ok_or_else(|| BloomError::data_type("boolean", self))
    }

    /// Byte form written to remote stores.
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            CacheValue::Int(i) => i.to_string().into_bytes(),
            CacheValue::Float(f) => f.to_string().into_bytes(),
            CacheValue::Str(s) => s.as_bytes().to_vec(),
            CacheValue::Bytes(b) => b.clone(),
            CacheValue::Bool(b) => if *b { b"1".to_vec() } else { b"0".to_vec() },
        }
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        CacheValue::Int(v)
    }
}

impl From<i32> for CacheValue {
    fn from(v: i32) -> Self {
        CacheValue::Int(v.into())
    }
}

impl From<u32> for CacheValue {
    fn from(v: u32) -> Self {
        CacheValue::Int(v.into())
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        CacheValue::Float(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        CacheValue::Str(v.to_owned())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        CacheValue::Str(v)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(v: Vec<u8>) -> Self {
        CacheValue::Bytes(v)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(v: &[u8]) -> Self {
        CacheValue::Bytes(v.to_vec())
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        CacheValue::Bool(v)
    }
}

/// Storage operations shared by the local and remote caches.
///
/// A key that is absent (never set, deleted or expired) reads as `Ok(None)`,
/// never as an error. Typed getters fail with [`BloomError::DataType`] when
/// the stored value cannot be coerced.
pub trait CacheStore: Send + Sync {
    /// Store with the cache's default TTL (no expiry if that is zero).
    fn set(&self, key: &str, value: CacheValue) -> Result<()>;
    /// Store with an explicit TTL in seconds; zero means no expiry.
    fn set_with_expire(
        &self,
        key: &str,
        value: CacheValue,
        ttl_secs: u64,
    ) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<CacheValue>>;
    fn del(&self, key: &str) -> Result<()>;

    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)?.map(|v| v.as_int()).transpose()
    }

    fn get_float(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)?.map(|v| v.as_float()).transpose()
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get(key)?.map(|v| v.as_string()).transpose()
    }

    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get(key)?.map(|v| v.as_bytes()).transpose()
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)?.map(|v| v.as_bool()).transpose()
    }
}

/// `ttl_secs` plus a random `0..=ttl_secs / 10`; zero stays zero.
pub fn jittered_ttl<R: Rng>(rng: &mut R, ttl_secs: u64) -> u64 {
    if ttl_secs == 0 {
        return 0;
    }
    ttl_secs + rng.random_range(0..=ttl_secs / 10)
}
