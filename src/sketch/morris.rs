//! Morris approximate counter: one byte per vertex, amortizing degree
//! tracking to O(1) memory instead of an exact counter.
//!
//! Each byte packs an exponent (`exponent_bits` high bits) and a
//! mantissa (`mantissa_bits` low bits). Because the byte is treated as
//! a single integer, a mantissa overflow carries naturally into the
//! exponent field — this is what gives the counter its widening range.

use std::sync::RwLock;

use rand::Rng;

const DEFAULT_EXPONENT_BITS: u32 = 3;
const DEFAULT_MANTISSA_BITS: u32 = 5;

/// Per-vertex approximate counters, grown by doubling on demand.
///
/// Increment/decrement/query all take the write lock: mutating a `u8`
/// has no stable lock-free path on every target, and the critical
/// section is a handful of instructions.
pub struct MorrisCounters {
    bytes: RwLock<Vec<u8>>,
    exponent_bits: u32,
    mantissa_bits: u32,
}

impl MorrisCounters {
    pub fn new() -> Self {
        Self::with_bits(DEFAULT_EXPONENT_BITS, DEFAULT_MANTISSA_BITS)
    }

    pub fn with_bits(exponent_bits: u32, mantissa_bits: u32) -> Self {
        debug_assert_eq!(exponent_bits + mantissa_bits, 8);
        Self {
            bytes: RwLock::new(Vec::new()),
            exponent_bits,
            mantissa_bits,
        }
    }

    /// Restore counters persisted in the meta sidecar.
    pub fn from_bytes(bytes: Vec<u8>, exponent_bits: u32, mantissa_bits: u32) -> Self {
        Self {
            bytes: RwLock::new(bytes),
            exponent_bits,
            mantissa_bits,
        }
    }

    pub fn exponent_bits(&self) -> u32 {
        self.exponent_bits
    }

    pub fn mantissa_bits(&self) -> u32 {
        self.mantissa_bits
    }

    fn mask(&self) -> u8 {
        ((1u32 << self.mantissa_bits) - 1) as u8
    }

    fn ensure_len(bytes: &mut Vec<u8>, index: usize) {
        if index >= bytes.len() {
            bytes.resize(index + 1, 0);
        }
    }

    /// Increment the counter for `index` with probability `1 / 2^exponent`.
    pub fn increment(&self, index: usize) {
        self.increment_with(index, &mut rand::thread_rng())
    }

    pub fn increment_with(&self, index: usize, rng: &mut impl Rng) {
        let mut bytes = self.bytes.write().unwrap();
        Self::ensure_len(&mut bytes, index);
        let byte = bytes[index];
        if byte == u8::MAX {
            return;
        }
        let exponent = byte >> self.mantissa_bits;
        if coin_flip(rng, exponent) {
            bytes[index] = byte + 1;
        }
    }

    /// Decrement the counter for `index` with probability `1 / 2^exponent`.
    pub fn decrement(&self, index: usize) {
        self.decrement_with(index, &mut rand::thread_rng())
    }

    pub fn decrement_with(&self, index: usize, rng: &mut impl Rng) {
        let mut bytes = self.bytes.write().unwrap();
        Self::ensure_len(&mut bytes, index);
        let byte = bytes[index];
        if byte == 0 {
            return;
        }
        let exponent = byte >> self.mantissa_bits;
        if coin_flip(rng, exponent) {
            bytes[index] = byte - 1;
        }
    }

    /// Estimated count: `(2^e - 1) * 2^mantissa_bits + 2^e * mantissa`.
    pub fn query(&self, index: usize) -> u64 {
        let bytes = self.bytes.read().unwrap();
        let byte = match bytes.get(index) {
            Some(&b) => b,
            None => return 0,
        };
        let exponent = (byte >> self.mantissa_bits) as u64;
        let mantissa = (byte & self.mask()) as u64;
        let two_e = 1u64 << exponent;
        (two_e - 1) * (1u64 << self.mantissa_bits) + two_e * mantissa
    }

    pub fn len(&self) -> usize {
        self.bytes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_bytes(&self) -> usize {
        self.bytes.read().unwrap().capacity()
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().unwrap().clone()
    }
}

impl Default for MorrisCounters {
    fn default() -> Self {
        Self::new()
    }
}

fn coin_flip(rng: &mut impl Rng, exponent: u8) -> bool {
    if exponent == 0 {
        return true;
    }
    rng.gen_bool(1.0 / (1u64 << exponent) as f64)
}
