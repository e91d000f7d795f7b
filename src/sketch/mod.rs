//! Approximate degree tracking: a Morris counter per vertex, with an
//! optional Count-Min sketch for comparison/benchmarking.

pub mod count_min;
pub mod morris;

pub use count_min::CountMinSketch;
pub use morris::MorrisCounters;
