use crate::config::FilterParams;
use crate::error::{BloomError, Result};
use crate::hash::{HashQuad, location};
use bitvec::{bitvec, order::Lsb0, vec::BitVec};
use std::sync::{Arc, Mutex, MutexGuard};

/// Bit array backing a Bloom filter.
///
/// Every operation touches the `num_hashes()` bits derived from a
/// [`HashQuad`] and must apply atomically: no other mutation of the same
/// array may interleave with the k-bit loop of a single call.
pub trait BitStorage: Send + Sync {
    /// Size of the bit array (`m`)
    fn num_bits(&self) -> usize;
    /// Number of bits touched per key (`k`)
    fn num_hashes(&self) -> usize;

    /// Sets all k bits of the key.
    fn set_all(&self, h: &HashQuad) -> Result<()>;
    /// Returns true if all k bits of the key are set.
    fn test_all(&self, h: &HashQuad) -> Result<bool>;
    /// Sets all k bits and returns whether they were all set before.
    fn test_add_all(&self, h: &HashQuad) -> Result<bool>;
    /// Clears the whole bit array.
    fn clear_all(&self) -> Result<()>;
}

impl<S: BitStorage + ?Sized> BitStorage for Box<S> {
    fn num_bits(&self) -> usize {
        (**self).num_bits()
    }
    fn num_hashes(&self) -> usize {
        (**self).num_hashes()
    }
    fn set_all(&self, h: &HashQuad) -> Result<()> {
        (**self).set_all(h)
    }
    fn test_all(&self, h: &HashQuad) -> Result<bool> {
        (**self).test_all(h)
    }
    fn test_add_all(&self, h: &HashQuad) -> Result<bool> {
        (**self).test_add_all(h)
    }
    fn clear_all(&self) -> Result<()> {
        (**self).clear_all()
    }
}

impl<S: BitStorage + ?Sized> BitStorage for Arc<S> {
    fn num_bits(&self) -> usize {
        (**self).num_bits()
    }
    fn num_hashes(&self) -> usize {
        (**self).num_hashes()
    }
    fn set_all(&self, h: &HashQuad) -> Result<()> {
        (**self).set_all(h)
    }
    fn test_all(&self, h: &HashQuad) -> Result<bool> {
        (**self).test_all(h)
    }
    fn test_add_all(&self, h: &HashQuad) -> Result<bool> {
        (**self).test_add_all(h)
    }
    fn clear_all(&self) -> Result<()> {
        (**self).clear_all()
    }
}

// In-memory storage implementation
pub struct InMemoryStorage {
    bits: Mutex<BitVec<usize, Lsb0>>,
    params: FilterParams,
}

impl InMemoryStorage {
    pub fn new(params: FilterParams) -> Self {
        Self {
            bits: Mutex::new(bitvec![0; params.bit_vector_size]),
            params,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BitVec<usize, Lsb0>>> {
        self.bits
            .lock()
            .map_err(|e| BloomError::LockError(e.to_string()))
    }

    /// Bit indices of a key, in hash order.
    fn indices(&self, h: &HashQuad) -> impl Iterator<Item = usize> {
        let m = self.params.bit_vector_size as u64;
        (0..self.params.num_hashes as u64)
            .map(move |i| (location(h, i) % m) as usize)
    }

    /// Number of bits currently set.
    pub fn count_ones(&self) -> Result<usize> {
        Ok(self.lock()?.count_ones())
    }
}

impl BitStorage for InMemoryStorage {
    fn num_bits(&self) -> usize {
        self.params.bit_vector_size
    }

    fn num_hashes(&self) -> usize {
        self.params.num_hashes
    }

    fn set_all(&self, h: &HashQuad) -> Result<()> {
        let mut bits = self.lock()?;
        for idx in self.indices(h) {
            bits.set(idx, true);
        }
        Ok(())
    }

    fn test_all(&self, h: &HashQuad) -> Result<bool> {
        let bits = self.lock()?;
        for idx in self.indices(h) {
            if !bits[idx] {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn test_add_all(&self, h: &HashQuad) -> Result<bool> {
        let mut bits = self.lock()?;
        let mut present = true;
        for idx in self.indices(h) {
            // `replace` returns the previous value of the bit
            if !bits.replace(idx, true) {
                present = false;
            }
        }
        Ok(present)
    }

    fn clear_all(&self) -> Result<()> {
        self.lock()?.fill(false);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "InMemoryStorage {{ bit_vector_size: {}, num_hashes: {} }}",
            self.params.bit_vector_size, self.params.num_hashes
        )
    }
}
