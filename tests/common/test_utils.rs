use rand::Rng;
use rand::distr::Alphanumeric;
use shared_bloom_rs::RedisConfig;

/// Open a client to the server named by `REDIS_URI` (or the local default)
/// and ping it. `None` when no server answers, so live tests can skip.
#[allow(dead_code)]
pub fn redis_client() -> Option<redis::Client> {
    let client = RedisConfig::from_env().client().ok()?;
    let mut conn = client.get_connection().ok()?;
    redis::cmd("PING").query::<String>(&mut conn).ok()?;
    Some(client)
}

/// Client for tests marked `#[ignore]` that only make sense against a live
/// server. Panics when none answers so an `--ignored` run never passes
/// without talking to redis.
#[allow(dead_code)]
pub fn live_redis() -> redis::Client {
    redis_client().expect(
        "No redis server answered PING; set REDIS_URI to run ignored tests",
    )
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per process.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Structure to manage temporary redis keys that are automatically cleaned up
#[allow(dead_code)]
pub struct TestKey {
    key: String,
    client: Option<redis::Client>,
}

impl TestKey {
    #[allow(dead_code)]
    /// Create a unique key with a name based on the test name
    pub fn new(test_name: &str, client: Option<redis::Client>) -> Self {
        let key = format!("test:{}:{}", test_name, rand::random::<u64>());
        Self { key, client }
    }

    #[allow(dead_code)]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for TestKey {
    fn drop(&mut self) {
        if let Some(mut conn) =
            self.client.as_ref().and_then(|c| c.get_connection().ok())
        {
            let _ = redis::cmd("DEL").arg(&self.key).query::<()>(&mut conn);
        }
    }
}

// Helper function to generate consistent test data
#[allow(dead_code)]
pub fn generate_test_items(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("test_item_{:06}", i).into_bytes())
        .collect()
}

#[allow(dead_code)]
pub fn generate_random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
