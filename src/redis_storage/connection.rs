use super::coerce_redis_error;
use crate::config::DEFAULT_REDIS_TIMEOUT;
use crate::error::{BloomError, Result};
use redis::{Client, Connection, RedisResult};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// A single redis connection opened on first use.
///
/// Calls are serialized on the connection. Connecting, reading and writing
/// are each bounded by `timeout`, so a stalled server fails the call instead
/// of holding the lock. A connection that failed with an I/O error, a drop
/// or a timeout is discarded so the next call reconnects; the failing call
/// itself is not retried.
pub(crate) struct LazyConnection {
    client: Option<Client>,
    conn: Mutex<Option<Connection>>,
    timeout: Duration,
    label: String,
}

impl LazyConnection {
    pub(crate) fn new(client: Option<Client>, label: impl Into<String>) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
            timeout: DEFAULT_REDIS_TIMEOUT,
            label: label.into(),
        }
    }

    /// Zero is raised to one millisecond; sockets reject a zero timeout.
    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout.max(Duration::from_millis(1));
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn open(&self, client: &Client) -> RedisResult<Connection> {
        debug!(target_key = %self.label, timeout_ms = self.timeout.as_millis() as u64, "Opening redis connection");
        let conn = client.get_connection_with_timeout(self.timeout)?;
        conn.set_read_timeout(Some(self.timeout))?;
        conn.set_write_timeout(Some(self.timeout))?;
        Ok(conn)
    }

    pub(crate) fn run<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T> {
        let client = self.client.as_ref().ok_or(BloomError::NoBackend)?;

        let mut slot = self.conn.lock().map_err(|e| {
            BloomError::LockError(format!("Redis lock error: {}", e))
        })?;

        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.open(client).map_err(coerce_redis_error)?,
        };
        let conn = slot.insert(conn);

        let result = op(conn);
        result.map_err(|e| {
            if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                warn!(target_key = %self.label, error = %e, "Dropping redis connection");
                *slot = None;
            }
            coerce_redis_error(e)
        })
    }
}
