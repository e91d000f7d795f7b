//! RocksDB-backed key-value collaborator.
//!
//! Owns column-family setup, merge-operator registration, and the
//! typed Get/Put/Merge/iterator surface the engine consumes. This is
//! the only module that touches the `rocksdb` crate directly.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, MergeOperands, Options, ReadOptions, DB};

use crate::codec;
use crate::config::{EncodingType, EngineConfig};
use crate::error::{GraphError, Result};
use crate::merge::{self, MERGE_OPERATOR_NAME};
use crate::policy::{derive_level_shape, LevelShape};
use crate::types::{encode_key, Edges, NodeId};

pub const CF_ADJACENCY: &str = "adjacency";
pub const CF_EDGE_PROPERTY: &str = "edge_property";
pub const CF_VERTEX_PROPERTY: &str = "vertex_property";

/// Shared vertex/edge counters. The merge operator callbacks run on
/// background compaction threads and update `m` directly; the engine
/// updates both from the foreground, so both fields are atomic.
#[derive(Default)]
pub struct Counters {
    pub n: AtomicI64,
    pub m: AtomicI64,
}

impl Counters {
    pub fn n(&self) -> u64 {
        self.n.load(Ordering::SeqCst).max(0) as u64
    }

    pub fn m(&self) -> u64 {
        self.m.load(Ordering::SeqCst).max(0) as u64
    }
}

pub struct KvStore {
    db: DB,
    format: EncodingType,
    pub counters: Arc<Counters>,
}

impl KvStore {
    pub fn open(config: &EngineConfig, counters: Arc<Counters>) -> Result<Self> {
        if config.auto_reinitialize && config.db_path.exists() {
            DB::destroy(&Options::default(), &config.db_path)?;
        }

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(
                CF_ADJACENCY,
                Self::cf_options_with_merge(config.encoding_type, counters.clone()),
            ),
            ColumnFamilyDescriptor::new(
                CF_EDGE_PROPERTY,
                Self::cf_options_with_merge(config.encoding_type, counters.clone()),
            ),
            ColumnFamilyDescriptor::new(
                CF_VERTEX_PROPERTY,
                Self::cf_options_with_merge(config.encoding_type, counters.clone()),
            ),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.db_path, cfs)?;

        tracing::debug!(path = %config.db_path.display(), "opened graph store");

        Ok(Self { db, format: config.encoding_type, counters })
    }

    fn cf_options_with_merge(format: EncodingType, counters: Arc<Counters>) -> Options {
        let mut opts = Options::default();
        let full_counters = counters;
        let full = move |_key: &[u8], existing: Option<&[u8]>, operands: &MergeOperands| {
            full_merge_callback(format, &full_counters, existing, operands)
        };
        let partial = move |_key: &[u8], _existing: Option<&[u8]>, operands: &MergeOperands| {
            partial_merge_callback(format, operands)
        };
        opts.set_merge_operator(MERGE_OPERATOR_NAME, full, partial);
        opts
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| GraphError::Corruption(format!("missing column family {name}")))
    }

    pub fn get_edges(&self, id: NodeId) -> Result<Option<Edges>> {
        let cf = self.cf(CF_ADJACENCY)?;
        match self.db.get_cf(cf, encode_key(id))? {
            Some(bytes) => Ok(Some(codec::decode(&bytes, self.format)?)),
            None => Ok(None),
        }
    }

    pub fn put_edges(&self, id: NodeId, edges: &Edges) -> Result<()> {
        let cf = self.cf(CF_ADJACENCY)?;
        self.db.put_cf(cf, encode_key(id), codec::encode(edges, self.format))?;
        Ok(())
    }

    /// Emit a lazy delta onto the out-list for `id`: a positive `target`
    /// is an add, a negative one is a tombstone.
    pub fn merge_out(&self, id: NodeId, target: NodeId) -> Result<()> {
        self.merge_delta(id, Edges { out: vec![target], r#in: vec![] })
    }

    pub fn merge_in(&self, id: NodeId, target: NodeId) -> Result<()> {
        self.merge_delta(id, Edges { out: vec![], r#in: vec![target] })
    }

    fn merge_delta(&self, id: NodeId, delta: Edges) -> Result<()> {
        let cf = self.cf(CF_ADJACENCY)?;
        let encoded = codec::encode(&delta, self.format);
        self.db.merge_cf(cf, encode_key(id), encoded)?;
        Ok(())
    }

    /// FullLazy layout: key is the vertex id plus a one-byte
    /// disambiguator, so multiple deltas for the same vertex coexist
    /// under distinct keys instead of being folded by the store.
    ///
    /// The disambiguator is a single byte, so two distinct neighbors
    /// whose ids differ by a multiple of 256 collide onto the same key.
    /// A plain `Put` would let the second overwrite the first and lose
    /// a live edge permanently, so this goes through `Merge` like the
    /// Lazy path: a colliding write folds with whatever fragment is
    /// already there instead of destroying it.
    pub fn put_full_lazy(&self, id: NodeId, disambiguator: u8, delta: &Edges) -> Result<()> {
        let cf = self.cf(CF_ADJACENCY)?;
        let mut key = encode_key(id).to_vec();
        key.push(disambiguator);
        self.db.merge_cf(cf, key, codec::encode(delta, self.format))?;
        Ok(())
    }

    /// Scan the `FullLazy` prefix `[v, v+1)` and fold every fragment
    /// into a single merged `Edges` record. The store's merge operator
    /// is never invoked for distinct keys, so this fold happens here.
    pub fn get_full_lazy(&self, id: NodeId) -> Result<Edges> {
        let cf = self.cf(CF_ADJACENCY)?;
        let lower = encode_key(id).to_vec();
        let mut upper = lower.clone();
        upper.push(0xFF);
        upper.push(0x01);

        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_lower_bound(lower);
        read_opts.set_iterate_upper_bound(upper);

        let iter = self.db.iterator_cf_opt(cf, read_opts, IteratorMode::Start);
        let mut acc = Edges::empty();
        for item in iter {
            let (_key, value) = item?;
            let fragment = codec::decode(&value, self.format)?;
            acc = merge::full_merge(acc, [fragment]).edges;
        }
        Ok(acc)
    }

    pub fn destroy(path: &Path) -> Result<()> {
        DB::destroy(&Options::default(), path)?;
        Ok(())
    }

    pub fn sync_wal(&self) -> Result<()> {
        self.db.flush_wal(true)?;
        Ok(())
    }

    /// Derive the adaptive policy's level shape from `GetColumnFamilyMetaData`.
    pub fn level_shape(&self) -> LevelShape {
        let Some(cf) = self.db.cf_handle(CF_ADJACENCY) else {
            return LevelShape::default();
        };
        let meta = self.db.get_column_family_metadata_cf(cf);
        let file_counts: Vec<usize> = meta.levels.iter().map(|l| l.files.len()).collect();
        let byte_sizes: Vec<u64> = meta.levels.iter().map(|l| l.size).collect();
        derive_level_shape(&file_counts, &byte_sizes)
    }
}

fn full_merge_callback(
    format: EncodingType,
    counters: &Counters,
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let decoded: Option<Vec<Edges>> = operands.into_iter().map(|op| codec::decode(op, format).ok()).collect();
    let decoded = decoded?;
    let (bytes, delta) = merge::full_merge_bytes(existing, decoded.into_iter(), format)?;
    counters.m.fetch_add(delta, Ordering::SeqCst);
    Some(bytes)
}

fn partial_merge_callback(format: EncodingType, operands: &MergeOperands) -> Option<Vec<u8>> {
    let mut iter = operands.into_iter();
    let mut acc = codec::decode(iter.next()?, format).ok()?;
    for op in iter {
        let next = codec::decode(op, format).ok()?;
        acc = merge::partial_merge(acc, next);
    }
    Some(codec::encode(&acc, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EdgeUpdatePolicy, FilterType};

    fn test_config(dir: &tempfile::TempDir) -> EngineConfig {
        EngineConfig {
            out_policy: EdgeUpdatePolicy::Eager,
            in_policy: EdgeUpdatePolicy::Eager,
            encoding_type: EncodingType::Plain,
            auto_reinitialize: false,
            db_path: dir.path().to_path_buf(),
            filter_type: FilterType::Morris,
            update_ratio: 0.5,
            lookup_ratio: 0.5,
            cache_miss_rate: 0.9,
        }
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(&test_config(&dir), Arc::new(Counters::default())).unwrap();
        let edges = Edges { out: vec![1, 2, 3], r#in: vec![4] };
        store.put_edges(10, &edges).unwrap();
        assert_eq!(store.get_edges(10).unwrap(), Some(edges));
    }

    #[test]
    fn get_missing_vertex_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(&test_config(&dir), Arc::new(Counters::default())).unwrap();
        assert_eq!(store.get_edges(999).unwrap(), None);
    }

    #[test]
    fn merge_then_compact_converges() {
        let dir = tempfile::tempdir().unwrap();
        let counters = Arc::new(Counters::default());
        let store = KvStore::open(&test_config(&dir), counters.clone()).unwrap();

        store.merge_out(1, 2).unwrap();
        store.merge_out(1, 2).unwrap();
        store.merge_out(1, -2).unwrap();

        let edges = store.get_edges(1).unwrap().unwrap_or_default();
        assert_eq!(edges.out, Vec::<NodeId>::new());
    }

    #[test]
    fn full_lazy_fragments_fold_together() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(&test_config(&dir), Arc::new(Counters::default())).unwrap();

        store
            .put_full_lazy(1, 2, &Edges { out: vec![2], r#in: vec![] })
            .unwrap();
        store
            .put_full_lazy(1, 3, &Edges { out: vec![3], r#in: vec![] })
            .unwrap();

        let folded = store.get_full_lazy(1).unwrap();
        assert_eq!(folded.out, vec![2, 3]);
    }

    #[test]
    fn full_lazy_handles_disambiguator_collision() {
        // Targets 2 and 258 share the same low byte (2), so they land
        // on the identical 9-byte key. A plain Put would let the
        // second overwrite the first; this must fold instead.
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(&test_config(&dir), Arc::new(Counters::default())).unwrap();

        store
            .put_full_lazy(1, 2, &Edges { out: vec![2], r#in: vec![] })
            .unwrap();
        store
            .put_full_lazy(1, 2, &Edges { out: vec![258], r#in: vec![] })
            .unwrap();

        let folded = store.get_full_lazy(1).unwrap();
        assert_eq!(folded.out, vec![2, 258]);
    }
}
