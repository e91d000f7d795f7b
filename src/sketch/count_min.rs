//! Count-Min sketch: secondary, comparison-mode degree estimator.
//!
//! `height = ceil(ln(1/delta))`, `width = ceil(e / epsilon)`. Each row
//! hashes the vertex id with an independent seeded PRNG rather than a
//! shared hash family, which keeps row independence simple to reason
//! about without pulling in a hashing crate beyond what's already used
//! elsewhere in the engine.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_DELTA: f64 = 0.1;
pub const DEFAULT_EPSILON: f64 = 1.0 / 12_000.0;

pub struct CountMinSketch {
    table: Vec<Vec<i64>>,
    row_salts: Vec<u64>,
    height: usize,
    width: usize,
}

impl CountMinSketch {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_DELTA, DEFAULT_EPSILON)
    }

    pub fn with_params(delta: f64, epsilon: f64) -> Self {
        let height = (1.0f64 / delta).ln().ceil().max(1.0) as usize;
        let width = (std::f64::consts::E / epsilon).ceil().max(1.0) as usize;
        let mut seed_rng = SmallRng::seed_from_u64(0x9E3779B97F4A7C15);
        let row_salts = (0..height).map(|_| seed_rng.gen::<u64>()).collect();
        Self {
            table: vec![vec![0i64; width]; height],
            row_salts,
            height,
            width,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn column_for(&self, row: usize, vertex: i64) -> usize {
        let mut rng = SmallRng::seed_from_u64((vertex as u64) ^ self.row_salts[row]);
        rng.gen_range(0..self.width)
    }

    pub fn update(&mut self, vertex: i64, delta: i64) {
        for row in 0..self.height {
            let col = self.column_for(row, vertex);
            self.table[row][col] += delta;
        }
    }

    pub fn estimate(&self, vertex: i64) -> i64 {
        (0..self.height)
            .map(|row| self.table[row][self.column_for(row, vertex)])
            .min()
            .unwrap_or(0)
    }

    pub fn memory_bytes(&self) -> usize {
        self.height * self.width * std::mem::size_of::<i64>()
    }
}

impl Default for CountMinSketch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_match_formulas() {
        let s = CountMinSketch::with_params(0.1, 1.0 / 12_000.0);
        assert_eq!(s.height(), (1.0f64 / 0.1).ln().ceil() as usize);
        assert_eq!(s.width(), (std::f64::consts::E / (1.0 / 12_000.0)).ceil() as usize);
    }

    #[test]
    fn estimate_never_undercounts() {
        let mut s = CountMinSketch::with_params(0.1, 0.01);
        for v in [1i64, 2, 3, 1, 1, 4] {
            s.update(v, 1);
        }
        assert!(s.estimate(1) >= 3);
        assert!(s.estimate(2) >= 1);
    }

    #[test]
    fn unseen_vertex_is_not_negative() {
        let s = CountMinSketch::with_params(0.1, 0.01);
        assert!(s.estimate(999) >= 0);
    }
}
