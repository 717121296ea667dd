//! Bit storage shared between processes through a Redis bitmap.
//!
//! Bit positions are derived inside Lua scripts (see [`scripts`]) so that
//! set / test / test-and-set run atomically on the server. Two bindings
//! exist, sending byte-identical scripts and arguments:
//!
//! * [`RedisStorage`] owns a [`redis::Client`] and reuses one connection,
//!   decoding replies as `i64`.
//! * [`PooledRedisStorage`] asks a [`ConnectionSource`] for a connection on
//!   every call and type-checks the generic [`redis::Value`] reply.
//!
//! Filters that use the same key share one logical bit array.
mod client;
mod connection;
mod pooled;
pub mod scripts;

pub use client::RedisStorage;
pub(crate) use connection::LazyConnection;
pub use pooled::{ConnectionSource, PooledRedisStorage};

use crate::config::FilterParams;
use crate::error::BloomError;
use crate::hash::HashQuad;
use redis::{ErrorKind, RedisError, Script, ScriptInvocation};

/// Key and geometry of a remote bitmap.
#[derive(Debug, Clone)]
pub(crate) struct RemoteBitmap {
    pub(crate) params: FilterParams,
    pub(crate) key: String,
}

impl RemoteBitmap {
    pub(crate) fn new(params: FilterParams, key: impl Into<String>) -> Self {
        Self {
            params,
            key: key.into(),
        }
    }

    /// Bind `KEYS[1]` and `ARGV = k, m, h0..h3` for one of the scripts.
    pub(crate) fn invocation<'a>(
        &self,
        script: &'a Script,
        h: &HashQuad,
    ) -> ScriptInvocation<'a> {
        let [h0, h1, h2, h3] = h.lanes32();
        let mut invocation = script.key(&self.key);
        invocation
            .arg(self.params.num_hashes)
            .arg(self.params.bit_vector_size)
            .arg(h0)
            .arg(h1)
            .arg(h2)
            .arg(h3);
        invocation
    }
}

/// Reply decoding failures are reported as [`BloomError::DataType`];
/// everything else is a transport failure.
pub(crate) fn coerce_redis_error(e: RedisError) -> BloomError {
    if e.kind() == ErrorKind::TypeError {
        BloomError::DataType(e.to_string())
    } else {
        BloomError::Transport(e)
    }
}
