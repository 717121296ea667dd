use super::{CacheStore, CacheValue, jittered_ttl};
use crate::error::{BloomError, Result};
use crate::redis_storage::LazyConnection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use redis::{Client, Commands, Script, Value};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

/// Store `ARGV[1]` under field `data` and the TTL under `exp`; an `exp` of
/// zero removes any expiry left by an earlier write.
pub const SET_CACHE: &str = r#"
local key, value, exp = KEYS[1], ARGV[1], tonumber(ARGV[2])
redis.call('HSET', key, 'data', value, 'exp', exp)
if exp ~= 0 then
    redis.call('EXPIRE', key, exp)
else
    redis.call('PERSIST', key)
end
return 1
"#;

/// Return field `data` and push the key's expiry forward by its stored TTL.
pub const GET_CACHE: &str = r#"
local key = KEYS[1]
local value = redis.call('HGET', key, 'data')
if value then
    local exp = tonumber(redis.call('HGET', key, 'exp'))
    if exp and exp ~= 0 then
        redis.call('EXPIRE', key, exp)
    end
end
return value
"#;

pub static SET_CACHE_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(SET_CACHE));
pub static GET_CACHE_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(GET_CACHE));

/// Cache entries kept in Redis, one hash per key.
///
/// Values are written in their [wire form](CacheValue::to_wire) and come back
/// as [`CacheValue::Bytes`]; the typed getters parse them. A read refreshes
/// the key's TTL on the server.
pub struct RedisCache<R = StdRng> {
    conn: LazyConnection,
    rng: Mutex<R>,
    default_ttl_secs: u64,
}

impl RedisCache<StdRng> {
    /// A missing `client` is accepted; every operation then fails with
    /// [`BloomError::NoBackend`].
    pub fn new(client: Option<Client>) -> Self {
        Self::with_rng(client, StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> RedisCache<R> {
    pub fn with_rng(client: Option<Client>, rng: R) -> Self {
        Self {
            conn: LazyConnection::new(client, "cache"),
            rng: Mutex::new(rng),
            default_ttl_secs: 0,
        }
    }

    /// TTL used by [`CacheStore::set`]; zero disables expiry.
    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Bound on connecting, reading and writing; defaults to
    /// [`DEFAULT_REDIS_TIMEOUT`](crate::DEFAULT_REDIS_TIMEOUT).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.conn.set_timeout(timeout);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.conn.timeout()
    }

    fn jittered(&self, ttl_secs: u64) -> Result<u64> {
        let mut rng = self.rng.lock().map_err(|e| {
            BloomError::LockError(format!("Cache rng lock error: {}", e))
        })?;
        Ok(jittered_ttl(&mut *rng, ttl_secs))
    }
}

/// `nil` is an absent key; anything but a string is a type mismatch.
fn decode_reply(reply: Value) -> Result<Option<CacheValue>> {
    match reply {
        Value::Nil => Ok(None),
        Value::BulkString(bytes) => Ok(Some(CacheValue::Bytes(bytes))),
        Value::SimpleString(s) => Ok(Some(CacheValue::Str(s))),
        other => Err(BloomError::data_type("string reply", other)),
    }
}

impl<R: Rng + Send> CacheStore for RedisCache<R> {
    fn set(&self, key: &str, value: CacheValue) -> Result<()> {
        self.set_with_expire(key, value, self.default_ttl_secs)
    }

    fn set_with_expire(
        &self,
        key: &str,
        value: CacheValue,
        ttl_secs: u64,
    ) -> Result<()> {
        if !self.conn.has_client() {
            return Err(BloomError::NoBackend);
        }
        let ttl = self.jittered(ttl_secs)?;
        let wire = value.to_wire();
        self.conn.run(|conn| {
            SET_CACHE_SCRIPT
                .key(key)
                .arg(wire.as_slice())
                .arg(ttl)
                .invoke::<()>(conn)
        })
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let reply: Value = self
            .conn
            .run(|conn| GET_CACHE_SCRIPT.key(key).invoke(conn))?;
        decode_reply(reply)
    }

    fn del(&self, key: &str) -> Result<()> {
        self.conn.run(|conn| conn.del::<_, ()>(key))
    }
}

impl<R> std::fmt::Debug for RedisCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("timeout", &self.conn.timeout())
            .field("has_client", &self.conn.has_client())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_client_is_no_backend() {
        let cache = RedisCache::with_rng(None, StdRng::seed_from_u64(3))
            .with_default_ttl(30);

        assert!(matches!(
            cache.set("k", CacheValue::from(1)),
            Err(BloomError::NoBackend)
        ));
        assert!(matches!(
            cache.set_with_expire("k", CacheValue::from(1), 5),
            Err(BloomError::NoBackend)
        ));
        assert!(matches!(cache.get("k"), Err(BloomError::NoBackend)));
        assert!(matches!(cache.get_int("k"), Err(BloomError::NoBackend)));
        assert!(matches!(cache.del("k"), Err(BloomError::NoBackend)));
    }

    #[test]
    fn test_decode_reply() {
        assert_eq!(decode_reply(Value::Nil).unwrap(), None);
        assert_eq!(
            decode_reply(Value::BulkString(b"12".to_vec())).unwrap(),
            Some(CacheValue::Bytes(b"12".to_vec()))
        );
        assert_eq!(
            decode_reply(Value::SimpleString("ok".into())).unwrap(),
            Some(CacheValue::Str("ok".into()))
        );
        assert!(matches!(
            decode_reply(Value::Int(1)),
            Err(BloomError::DataType(_))
        ));
        assert!(matches!(
            decode_reply(Value::Array(vec![])),
            Err(BloomError::DataType(_))
        ));
    }

    #[test]
    fn test_scripts_reference_both_fields() {
        for source in [SET_CACHE, GET_CACHE] {
            assert!(source.contains("'data'"));
            assert!(source.contains("'exp'"));
        }
        assert!(SET_CACHE.contains("PERSIST"));
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        let client = Client::open("redis://127.0.0.1:1/").unwrap();
        let cache = RedisCache::new(Some(client));
        let err = cache.get("k").unwrap_err();
        assert!(matches!(err, BloomError::Transport(_)), "got {:?}", err);
    }
}
