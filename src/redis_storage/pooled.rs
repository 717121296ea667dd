use super::scripts::{SET_ALL_SCRIPT, TEST_ADD_ALL_SCRIPT, TEST_ALL_SCRIPT};
use super::{RemoteBitmap, coerce_redis_error};
use crate::config::FilterParams;
use crate::error::{BloomError, Result};
use crate::hash::HashQuad;
use crate::storage::BitStorage;
use redis::{ConnectionLike, Script, Value};

/// Hands out a connection per call, typically checked out of a pool.
///
/// Returning `None` means no connection is available and the call fails
/// with [`BloomError::NoBackend`]. Any `Fn() -> Option<C>` closure is a
/// source.
pub trait ConnectionSource: Send + Sync {
    type Conn: ConnectionLike;

    fn connection(&self) -> Option<Self::Conn>;
}

impl<F, C> ConnectionSource for F
where
    F: Fn() -> Option<C> + Send + Sync,
    C: ConnectionLike,
{
    type Conn = C;

    fn connection(&self) -> Option<C> {
        self()
    }
}

/// Redis bitmap driven through a [`ConnectionSource`].
///
/// Script replies are kept as a raw [`Value`]; anything other than an
/// integer reply is a [`BloomError::DataType`].
pub struct PooledRedisStorage<P> {
    bitmap: RemoteBitmap,
    source: Option<P>,
}

impl<P: ConnectionSource> PooledRedisStorage<P> {
    /// A missing `source` is accepted here; every operation then fails with
    /// [`BloomError::NoBackend`].
    pub fn new(
        params: FilterParams,
        key: impl Into<String>,
        source: Option<P>,
    ) -> Self {
        Self {
            bitmap: RemoteBitmap::new(params, key),
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.bitmap.key
    }

    fn connection(&self) -> Result<P::Conn> {
        self.source
            .as_ref()
            .and_then(|source| source.connection())
            .ok_or(BloomError::NoBackend)
    }

    fn run_script(&self, script: &Script, h: &HashQuad) -> Result<Value> {
        let mut conn = self.connection()?;
        self.bitmap
            .invocation(script, h)
            .invoke(&mut conn)
            .map_err(coerce_redis_error)
    }

    fn run_flag_script(&self, script: &Script, h: &HashQuad) -> Result<bool> {
        match self.run_script(script, h)? {
            Value::Int(reply) => Ok(reply == 1),
            other => Err(BloomError::data_type("integer reply", other)),
        }
    }
}

impl<P: ConnectionSource> BitStorage for PooledRedisStorage<P> {
    fn num_bits(&self) -> usize {
        self.bitmap.params.bit_vector_size
    }

    fn num_hashes(&self) -> usize {
        self.bitmap.params.num_hashes
    }

    fn set_all(&self, h: &HashQuad) -> Result<()> {
        self.run_script(&SET_ALL_SCRIPT, h).map(|_| ())
    }

    fn test_all(&self, h: &HashQuad) -> Result<bool> {
        self.run_flag_script(&TEST_ALL_SCRIPT, h)
    }

    fn test_add_all(&self, h: &HashQuad) -> Result<bool> {
        self.run_flag_script(&TEST_ADD_ALL_SCRIPT, h)
    }

    fn clear_all(&self) -> Result<()> {
        let mut conn = self.connection()?;
        redis::cmd("DEL")
            .arg(&self.bitmap.key)
            .query::<Value>(&mut conn)
            .map_err(coerce_redis_error)?;
        Ok(())
    }
}

impl<P> std::fmt::Debug for PooledRedisStorage<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledRedisStorage")
            .field("key", &self.bitmap.key)
            .field("bit_vector_size", &self.bitmap.params.bit_vector_size)
            .field("num_hashes", &self.bitmap.params.num_hashes)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
