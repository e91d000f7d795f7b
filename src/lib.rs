//! Embeddable graph storage engine over a log-structured key-value store.
//!
//! [`engine::GraphEngine`] is the public entry point: it owns vertex/edge
//! lifecycle, the write-path dispatcher (eager, lazy, full-lazy, and
//! adaptive edge-update policies), approximate degree tracking, and the
//! adjacency codec. See `SPEC_FULL.md` for the full component design.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod kv;
pub mod merge;
pub mod meta;
pub mod policy;
pub mod sketch;
pub mod types;

pub use config::{EdgeUpdatePolicy, EncodingType, EngineConfig, FilterType};
pub use engine::GraphEngine;
pub use error::{GraphError, Result};
pub use types::{Edges, NodeId};
