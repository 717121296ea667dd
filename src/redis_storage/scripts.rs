//! Lua scripts executed by Redis for the remote bit storage.
//!
//! Each script receives `KEYS[1]` = bitmap key and
//! `ARGV = k, m, h0, h1, h2, h3` and walks the k locations server-side, so a
//! call is one atomic unit with respect to every other script on the same
//! key. Both client bindings load these exact sources.

use redis::Script;
use std::sync::LazyLock;

pub const SET_ALL: &str = r#"
local bloom_key = KEYS[1]
local k, m = tonumber(ARGV[1]), tonumber(ARGV[2])
local h = {tonumber(ARGV[3]), tonumber(ARGV[4]), tonumber(ARGV[5]), tonumber(ARGV[6])}
for i = 0, k - 1 do
    local loc = (h[(i % 2) + 1] + i * h[3 + ((i + (i % 2)) % 4) / 2]) % m
    redis.call('SETBIT', bloom_key, loc, 1)
end
return 1
"#;

pub const TEST_ALL: &str = r#"
local bloom_key = KEYS[1]
local k, m = tonumber(ARGV[1]), tonumber(ARGV[2])
local h = {tonumber(ARGV[3]), tonumber(ARGV[4]), tonumber(ARGV[5]), tonumber(ARGV[6])}
for i = 0, k - 1 do
    local loc = (h[(i % 2) + 1] + i * h[3 + ((i + (i % 2)) % 4) / 2]) % m
    if redis.call('GETBIT', bloom_key, loc) == 0 then
        return 0
    end
end
return 1
"#;

pub const TEST_ADD_ALL: &str = r#"
local bloom_key = KEYS[1]
local k, m = tonumber(ARGV[1]), tonumber(ARGV[2])
local h = {tonumber(ARGV[3]), tonumber(ARGV[4]), tonumber(ARGV[5]), tonumber(ARGV[6])}
local present = 1
for i = 0, k - 1 do
    local loc = (h[(i % 2) + 1] + i * h[3 + ((i + (i % 2)) % 4) / 2]) % m
    if redis.call('SETBIT', bloom_key, loc, 1) == 0 then
        present = 0
    end
end
return present
"#;

pub(crate) static SET_ALL_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(SET_ALL));
pub(crate) static TEST_ALL_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(TEST_ALL));
pub(crate) static TEST_ADD_ALL_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(TEST_ADD_ALL));
