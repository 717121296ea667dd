//! Runs the bitmap scripts in an embedded Lua 5.1, the dialect Redis ships,
//! against an in-memory `redis.call`, and checks every bit offset they touch
//! against `script_location`.
mod common;

use common::test_utils::generate_test_items;
use mlua::Lua;
use shared_bloom_rs::redis_storage::scripts::{SET_ALL, TEST_ADD_ALL, TEST_ALL};
use shared_bloom_rs::{HashQuad, base_hashes, script_location};

/// `redis.call` backed by a Lua table. Every offset passed to SETBIT or
/// GETBIT is appended to `calls`.
const FAKE_REDIS: &str = r#"
calls = {}
bits = {}
redis = {}
function redis.call(cmd, key, offset, value)
    calls[#calls + 1] = offset
    local old = bits[offset] or 0
    if cmd == 'SETBIT' then
        bits[offset] = value
    elseif cmd ~= 'GETBIT' then
        error('unexpected command ' .. cmd)
    end
    return old
end
"#;

const SIZES: [(u64, u64); 5] = [
    (1000, 4),
    (9586, 7),
    (1 << 20, 14),
    ((1 << 32) - 5, 1),
    ((1 << 32) - 5, 7),
];

fn fake_redis() -> Lua {
    let lua = Lua::new();
    lua.load(FAKE_REDIS).exec().expect("Stub should load");
    lua
}

/// Bind `KEYS` and `ARGV` the way the storage bindings do.
fn bind_args(lua: &Lua, h: &HashQuad, m: u64, k: u64) {
    let globals = lua.globals();
    globals.set("KEYS", vec!["test:lua"]).unwrap();
    let mut argv = vec![k.to_string(), m.to_string()];
    argv.extend(h.lanes32().iter().map(|lane| lane.to_string()));
    globals.set("ARGV", argv).unwrap();
}

fn run(lua: &Lua, source: &str) -> i64 {
    lua.load("calls = {}").exec().unwrap();
    lua.load(source).eval::<i64>().expect("Script should run")
}

fn touched(lua: &Lua) -> Vec<u64> {
    let calls: Vec<f64> = lua.globals().get("calls").unwrap();
    calls.into_iter().map(|offset| offset as u64).collect()
}

fn expected(h: &HashQuad, m: u64, k: u64) -> Vec<u64> {
    (0..k).map(|i| script_location(h, i, m)).collect()
}

#[cfg(test)]
mod lua_script_tests {
    use super::*;

    #[test]
    fn test_set_all_touches_script_locations() {
        for (m, k) in SIZES {
            for item in generate_test_items(20) {
                let h = base_hashes(&item);
                let lua = fake_redis();
                bind_args(&lua, &h, m, k);

                assert_eq!(run(&lua, SET_ALL), 1);
                assert_eq!(
                    touched(&lua),
                    expected(&h, m, k),
                    "SET_ALL offsets differ for m={} k={}",
                    m,
                    k
                );
            }
        }
    }

    #[test]
    fn test_test_add_all_reports_new_then_present() {
        for (m, k) in SIZES {
            let h = base_hashes(b"hello_world");
            let lua = fake_redis();
            bind_args(&lua, &h, m, k);

            assert_eq!(run(&lua, TEST_ADD_ALL), 0, "m={} k={}", m, k);
            assert_eq!(touched(&lua), expected(&h, m, k));
            assert_eq!(run(&lua, TEST_ADD_ALL), 1, "m={} k={}", m, k);
            assert_eq!(touched(&lua), expected(&h, m, k));
        }
    }

    #[test]
    fn test_test_all_sees_bits_from_set_all() {
        for (m, k) in SIZES {
            let h = base_hashes(b"Bess");
            let lua = fake_redis();
            bind_args(&lua, &h, m, k);

            // Stops at the first clear bit
            assert_eq!(run(&lua, TEST_ALL), 0);
            assert_eq!(touched(&lua), expected(&h, m, 1));

            run(&lua, SET_ALL);
            assert_eq!(run(&lua, TEST_ALL), 1);
            assert_eq!(touched(&lua), expected(&h, m, k));
        }
    }

    #[test]
    fn test_large_lanes_stay_exact() {
        // Every lane at its maximum gives the largest intermediate value
        let h = HashQuad::from([u32::MAX as u64; 4]);
        let (m, k) = ((1u64 << 32) - 5, 14);
        let lua = fake_redis();
        bind_args(&lua, &h, m, k);

        run(&lua, SET_ALL);
        assert_eq!(touched(&lua), expected(&h, m, k));
        assert!(touched(&lua).iter().all(|&offset| offset < m));
    }
}
