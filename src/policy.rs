//! Adaptive write-path cost model.
//!
//! Decides, per call, whether an eager read-modify-write or a lazy
//! merge-delta is cheaper for a vertex of a given approximate degree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

const DEFAULT_BLOCK_SIZE: f64 = 4096.0;
const V_SIZE: f64 = 8.0;
const E_SIZE: f64 = 8.0;
const REFRESH_INTERVAL: u64 = 10_000;
const DEFAULT_LEVEL_MULT: f64 = 10.0;

/// Snapshot of LSM level shape used by the cost model, refreshed
/// periodically from store metadata.
#[derive(Debug, Clone, Copy)]
pub struct LevelShape {
    pub level_mult: f64,
    pub level_num: u32,
}

impl Default for LevelShape {
    fn default() -> Self {
        Self { level_mult: DEFAULT_LEVEL_MULT, level_num: 1 }
    }
}

pub struct AdaptivePolicy {
    shape: RwLock<LevelShape>,
    decisions_since_refresh: AtomicU64,
    block_size: f64,
    cache_miss_rate: f64,
}

impl AdaptivePolicy {
    pub fn new(cache_miss_rate: f64) -> Self {
        Self {
            shape: RwLock::new(LevelShape::default()),
            decisions_since_refresh: AtomicU64::new(0),
            block_size: DEFAULT_BLOCK_SIZE,
            cache_miss_rate,
        }
    }

    /// Whether a refresh of `level_num`/`level_mult` from store metadata
    /// is due. Callers should refresh and call [`Self::set_shape`] when
    /// this returns true.
    pub fn refresh_due(&self) -> bool {
        self.decisions_since_refresh.load(Ordering::Relaxed) >= REFRESH_INTERVAL
    }

    pub fn set_shape(&self, shape: LevelShape) {
        *self.shape.write().unwrap() = shape;
        self.decisions_since_refresh.store(0, Ordering::Relaxed);
    }

    pub fn shape(&self) -> LevelShape {
        *self.shape.read().unwrap()
    }

    /// Decide eager (`true`) vs lazy (`false`) for a vertex with
    /// approximate degree `d`, given the graph's current `(m, n)` and
    /// caller-supplied `update_ratio`/`lookup_ratio`.
    pub fn decide_eager(&self, d: u64, m: u64, n: u64, update_ratio: f64, lookup_ratio: f64) -> bool {
        self.decisions_since_refresh.fetch_add(1, Ordering::Relaxed);
        let shape = self.shape();
        let d = d as f64;
        let wa = shape.level_mult * shape.level_num as f64;
        let left = (2.0 + (V_SIZE + E_SIZE * d) / self.block_size)
            + (E_SIZE * (d - 1.0).max(0.0)) * wa / self.block_size;

        let n = n.max(1) as f64;
        let denom = ((shape.level_mult - 1.0).max(1e-9)) * update_ratio.max(1e-9);
        let right = self.cache_miss_rate * (m as f64 / n) * lookup_ratio / denom;

        left < right
    }
}

/// Derive [`LevelShape`] from a column family's per-level file counts and
/// total byte sizes, as surfaced by `GetColumnFamilyMetaData`. Levels
/// with zero files are excluded from `level_num`; `level_mult` is the
/// ratio of consecutive non-empty levels' total size, falling back to
/// the default when fewer than two non-empty levels exist.
pub fn derive_level_shape(level_file_counts: &[usize], level_byte_sizes: &[u64]) -> LevelShape {
    let non_empty: Vec<u64> = level_file_counts
        .iter()
        .zip(level_byte_sizes.iter())
        .filter(|(&files, _)| files > 0)
        .map(|(_, &bytes)| bytes)
        .collect();

    let level_num = non_empty.len() as u32;
    let level_mult = if non_empty.len() >= 2 {
        let ratios: Vec<f64> = non_empty
            .windows(2)
            .filter(|w| w[0] > 0)
            .map(|w| w[1] as f64 / w[0] as f64)
            .collect();
        if ratios.is_empty() {
            DEFAULT_LEVEL_MULT
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        }
    } else {
        DEFAULT_LEVEL_MULT
    };

    LevelShape { level_mult, level_num: level_num.max(1) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_degree_vertex_prefers_eager() {
        // Scenario S5: update_ratio=0.9, lookup_ratio=0.1, level_mult=10.
        let policy = AdaptivePolicy::new(0.9);
        policy.set_shape(LevelShape { level_mult: 10.0, level_num: 3 });
        let eager = policy.decide_eager(4, 10_000, 1_000, 0.9, 0.1);
        assert!(eager, "low-degree vertex should pick eager");
    }

    #[test]
    fn high_degree_vertex_prefers_lazy() {
        let policy = AdaptivePolicy::new(0.9);
        policy.set_shape(LevelShape { level_mult: 10.0, level_num: 3 });
        let eager = policy.decide_eager(4_000, 10_000, 1_000, 0.9, 0.1);
        assert!(!eager, "high-degree vertex should pick lazy");
    }

    #[test]
    fn refresh_due_after_interval() {
        let policy = AdaptivePolicy::new(0.9);
        assert!(!policy.refresh_due());
        for _ in 0..REFRESH_INTERVAL {
            policy.decide_eager(1, 1, 1, 0.5, 0.5);
        }
        assert!(policy.refresh_due());
    }

    #[test]
    fn derive_shape_defaults_with_single_level() {
        let shape = derive_level_shape(&[3], &[1000]);
        assert_eq!(shape.level_num, 1);
        assert_eq!(shape.level_mult, DEFAULT_LEVEL_MULT);
    }

    #[test]
    fn derive_shape_averages_ratios() {
        let shape = derive_level_shape(&[1, 1, 1], &[100, 1000, 10000]);
        assert_eq!(shape.level_num, 3);
        assert!((shape.level_mult - 10.0).abs() < 1e-9);
    }

    #[test]
    fn derive_shape_skips_empty_levels() {
        let shape = derive_level_shape(&[1, 0, 1], &[100, 0, 500]);
        assert_eq!(shape.level_num, 2);
    }
}
