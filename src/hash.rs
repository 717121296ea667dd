use murmur3::murmur3_x64_128;
use std::io::Cursor;

/// The four base hash values of a key.
///
/// Computed once per key and fed to [`location`] to derive any number of bit
/// positions without hashing the key again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashQuad(pub [u64; 4]);

impl HashQuad {
    /// Low 32 bits of each hash, the form sent to the remote scripts.
    ///
    /// Redis runs Lua with double precision numbers, so the scripts only
    /// receive values small enough to keep `h + i * h` exact.
    pub fn lanes32(&self) -> [u32; 4] {
        self.0.map(|h| h as u32)
    }
}

impl From<[u64; 4]> for HashQuad {
    fn from(h: [u64; 4]) -> Self {
        Self(h)
    }
}

pub(crate) fn hash_murmur128(key: &[u8], seed: u32) -> (u64, u64) {
    let mut cursor = Cursor::new(key);
    // Reading from an in-memory cursor cannot fail.
    let hash = murmur3_x64_128(&mut cursor, seed)
        .expect("Failed to compute Murmur3 hash");
    (hash as u64, (hash >> 64) as u64)
}

/// Hash `data` into the four base values used by the location scheme.
///
/// MurmurHash3 x64/128 is run twice with seeds 0 and 1; each 128 bit output
/// is split into its low and high halves.
pub fn base_hashes(data: &[u8]) -> HashQuad {
    let (h1, h2) = hash_murmur128(data, 0);
    let (h3, h4) = hash_murmur128(data, 1);
    HashQuad([h1, h2, h3, h4])
}

/// The `i`-th virtual location of a key (enhanced double hashing).
///
/// `h[i % 2] + i * h[2 + ((i + i % 2) % 4) / 2]`, wrapping on overflow.
/// Reduce modulo the bit vector size to get the bit index.
#[inline]
pub fn location(h: &HashQuad, i: u64) -> u64 {
    let h = &h.0;
    h[(i % 2) as usize]
        .wrapping_add(i.wrapping_mul(h[2 + (((i + (i % 2)) % 4) / 2) as usize]))
}

/// Bit index computed by the remote scripts for hash number `i`.
///
/// Same formula as [`location`] over [`HashQuad::lanes32`]. For `i < 2^21`
/// no intermediate exceeds 2^53, so the Lua double arithmetic is exact and
/// this function reproduces it bit for bit.
#[inline]
pub fn script_location(h: &HashQuad, i: u64, m: u64) -> u64 {
    let h = h.lanes32().map(u64::from);
    (h[(i % 2) as usize] + i * h[2 + (((i + (i % 2)) % 4) / 2) as usize]) % m
}

/// Estimate the bit vector size `m` and hash count `k` for `n` elements at a
/// false positive rate of `p`.
///
/// * `m = ceil(-n * ln(p) / ln(2)^2)`
/// * `k = ceil(ln(2) * m / n)`
///
/// Degenerate inputs may yield zero; the filter constructors floor both
/// values to one.
pub fn estimate_parameters(n: usize, p: f64) -> (usize, usize) {
    let m = optimal_bit_vector_size(n, p);
    let k = optimal_num_hashes(n, m);
    (m, k)
}

pub fn optimal_bit_vector_size(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as usize
}

pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    ((m as f64 / n as f64) * std::f64::consts::LN_2).ceil() as usize
}
