//! Engine configuration.
//!
//! Constructible directly via the builder methods, or loaded from a TOML
//! file for embedding applications that prefer file-based configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeUpdatePolicy {
    Eager,
    Lazy,
    Adaptive,
    FullLazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingType {
    Plain,
    EliasFanoPartitioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    None,
    Morris,
    CountMin,
    All,
}

impl FilterType {
    pub fn wants_morris(&self) -> bool {
        matches!(self, FilterType::Morris | FilterType::All)
    }

    pub fn wants_count_min(&self) -> bool {
        matches!(self, FilterType::CountMin | FilterType::All)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub out_policy: EdgeUpdatePolicy,
    pub in_policy: EdgeUpdatePolicy,
    pub encoding_type: EncodingType,
    pub auto_reinitialize: bool,
    pub db_path: PathBuf,
    pub filter_type: FilterType,
    pub update_ratio: f64,
    pub lookup_ratio: f64,
    pub cache_miss_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            out_policy: EdgeUpdatePolicy::Adaptive,
            in_policy: EdgeUpdatePolicy::Adaptive,
            encoding_type: EncodingType::Plain,
            auto_reinitialize: false,
            db_path: PathBuf::from("./graph_db"),
            filter_type: FilterType::Morris,
            update_ratio: 0.5,
            lookup_ratio: 0.5,
            cache_miss_rate: 0.9,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if (self.update_ratio + self.lookup_ratio - 1.0).abs() > 1e-6 {
            return Err(GraphError::InvalidArgument(
                "update_ratio + lookup_ratio must sum to 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cache_miss_rate) {
            return Err(GraphError::InvalidArgument(
                "cache_miss_rate must be in [0, 1]".into(),
            ));
        }
        if self.encoding_type == EncodingType::EliasFanoPartitioned
            && (self.out_policy == EdgeUpdatePolicy::FullLazy
                || self.in_policy == EdgeUpdatePolicy::FullLazy)
        {
            return Err(GraphError::InvalidArgument(
                "EliasFanoPartitioned encoding is incompatible with FullLazy (tombstones cannot round-trip through the compressed codec)".into(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| GraphError::Config(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    inner: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn out_policy(mut self, p: EdgeUpdatePolicy) -> Self {
        self.inner.out_policy = p;
        self
    }
    pub fn in_policy(mut self, p: EdgeUpdatePolicy) -> Self {
        self.inner.in_policy = p;
        self
    }
    pub fn encoding_type(mut self, e: EncodingType) -> Self {
        self.inner.encoding_type = e;
        self
    }
    pub fn auto_reinitialize(mut self, v: bool) -> Self {
        self.inner.auto_reinitialize = v;
        self
    }
    pub fn db_path(mut self, p: impl Into<PathBuf>) -> Self {
        self.inner.db_path = p.into();
        self
    }
    pub fn filter_type(mut self, f: FilterType) -> Self {
        self.inner.filter_type = f;
        self
    }
    pub fn update_ratio(mut self, r: f64) -> Self {
        self.inner.update_ratio = r;
        self.inner.lookup_ratio = 1.0 - r;
        self
    }
    pub fn cache_miss_rate(mut self, r: f64) -> Self {
        self.inner.cache_miss_rate = r;
        self
    }
    pub fn build(self) -> Result<EngineConfig> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn ratios_must_sum_to_one() {
        let mut cfg = EngineConfig::default();
        cfg.update_ratio = 0.9;
        cfg.lookup_ratio = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn efp_forbids_full_lazy() {
        let cfg = EngineConfig::builder()
            .encoding_type(EncodingType::EliasFanoPartitioned)
            .out_policy(EdgeUpdatePolicy::FullLazy)
            .build();
        assert!(cfg.is_err());
    }

    #[test]
    fn builder_normalizes_lookup_ratio() {
        let cfg = EngineConfig::builder().update_ratio(0.3).build().unwrap();
        assert!((cfg.lookup_ratio - 0.7).abs() < 1e-9);
    }
}
