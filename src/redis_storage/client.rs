use super::scripts::{SET_ALL_SCRIPT, TEST_ADD_ALL_SCRIPT, TEST_ALL_SCRIPT};
use super::RemoteBitmap;
use super::connection::LazyConnection;
use crate::config::FilterParams;
use crate::error::Result;
use crate::hash::HashQuad;
use crate::storage::BitStorage;
use redis::{Client, Commands, Script};
use std::time::Duration;

/// Redis bitmap driven through a [`redis::Client`].
///
/// One connection is opened lazily and reused for every call. After a
/// transport failure it is dropped, and the next call reconnects. Script
/// replies are decoded straight into `i64`.
pub struct RedisStorage {
    bitmap: RemoteBitmap,
    conn: LazyConnection,
}

impl RedisStorage {
    /// A missing `client` is accepted here; every operation then fails with
    /// [`BloomError::NoBackend`](crate::BloomError::NoBackend).
    pub fn new(
        params: FilterParams,
        key: impl Into<String>,
        client: Option<Client>,
    ) -> Self {
        let bitmap = RemoteBitmap::new(params, key);
        Self {
            conn: LazyConnection::new(client, bitmap.key.clone()),
            bitmap,
        }
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

    pub fn key(&self) -> &str {
        &self.bitmap.key
    }

    fn run_flag_script(&self, script: &Script, h: &HashQuad) -> Result<bool> {
        let reply: i64 = self.conn.run(|conn| {
            self.bitmap.invocation(script, h).invoke(conn)
        })?;
        Ok(reply == 1)
    }
}

impl BitStorage for RedisStorage {
    fn num_bits(&self) -> usize {
        self.bitmap.params.bit_vector_size
    }

    fn num_hashes(&self) -> usize {
        self.bitmap.params.num_hashes
    }

    fn set_all(&self, h: &HashQuad) -> Result<()> {
        self.conn.run(|conn| {
            self.bitmap.invocation(&SET_ALL_SCRIPT, h).invoke::<()>(conn)
        })
    }

    fn test_all(&self, h: &HashQuad) -> Result<bool> {
        self.run_flag_script(&TEST_ALL_SCRIPT, h)
    }

    fn test_add_all(&self, h: &HashQuad) -> Result<bool> {
        self.run_flag_script(&TEST_ADD_ALL_SCRIPT, h)
    }

    fn clear_all(&self) -> Result<()> {
        self.conn.run(|conn| conn.del::<_, ()>(&self.bitmap.key))
    }
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("key", &self.bitmap.key)
            .field("bit_vector_size", &self.bitmap.params.bit_vector_size)
            .field("num_hashes", &self.bitmap.params.num_hashes)
            .field("timeout", &self.conn.timeout())
            .field("has_client", &self.conn.has_client())
            .finish()
    }
}
