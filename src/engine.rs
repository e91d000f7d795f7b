//! Graph engine facade: write-path dispatch, read path, bulk load, and
//! lifecycle (open/close, meta sidecar persistence).

use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

use rand::Rng;

use crate::codec;
use crate::config::{EdgeUpdatePolicy, EncodingType, EngineConfig, FilterType};
use crate::error::{GraphError, Result};
use crate::kv::{Counters, KvStore};
use crate::meta::GraphMeta;
use crate::policy::AdaptivePolicy;
use crate::sketch::{CountMinSketch, MorrisCounters};
use crate::types::{Edges, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Out,
    In,
}

pub struct GraphEngine {
    kv: KvStore,
    counters: Arc<Counters>,
    morris: Option<MorrisCounters>,
    count_min: Option<RwLock<CountMinSketch>>,
    adaptive: AdaptivePolicy,
    config: EngineConfig,
}

impl GraphEngine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let counters = Arc::new(Counters::default());
        let kv = KvStore::open(&config, counters.clone())?;

        let morris = if config.filter_type.wants_morris() {
            Some(MorrisCounters::new())
        } else {
            None
        };
        let count_min = if config.filter_type.wants_count_min() {
            Some(RwLock::new(CountMinSketch::new()))
        } else {
            None
        };

        let mut engine = Self {
            kv,
            counters,
            morris,
            count_min,
            adaptive: AdaptivePolicy::new(config.cache_miss_rate),
            config,
        };

        if let Some(meta) = GraphMeta::read_from(&engine.config.db_path)? {
            engine.counters.n.store(meta.n, Ordering::SeqCst);
            engine.counters.m.store(meta.m, Ordering::SeqCst);
            if let Some(morris) = &engine.morris {
                if meta.morris_exponent_bits as u32 == morris.exponent_bits()
                    && meta.morris_mantissa_bits as u32 == morris.mantissa_bits()
                {
                    engine.morris = Some(MorrisCounters::from_bytes(
                        meta.morris_bytes,
                        morris.exponent_bits(),
                        morris.mantissa_bits(),
                    ));
                } else {
                    tracing::warn!("persisted Morris counter bit layout does not match current configuration, starting fresh");
                }
            }
        }

        Ok(engine)
    }

    /// Flush counters and the Morris sketch to the sidecar file and
    /// sync the store's write-ahead log.
    pub fn close(&self) -> Result<()> {
        self.kv.sync_wal()?;
        let (morris_bytes, exponent_bits, mantissa_bits) = match &self.morris {
            Some(m) => (m.snapshot(), m.exponent_bits() as i32, m.mantissa_bits() as i32),
            None => (Vec::new(), 0, 0),
        };
        let meta = GraphMeta {
            n: self.counters.n.load(Ordering::SeqCst),
            m: self.counters.m.load(Ordering::SeqCst),
            morris_bytes,
            morris_exponent_bits: exponent_bits,
            morris_mantissa_bits: mantissa_bits,
        };
        meta.write_to(&self.config.db_path)
    }

    pub fn vertex_count(&self) -> u64 {
        self.counters.n()
    }

    pub fn edge_count(&self) -> u64 {
        self.counters.m()
    }

    // ── Write path ──────────────────────────────────────────────────

    pub fn add_vertex(&self, id: NodeId) -> Result<()> {
        validate_id(id)?;
        if self.kv.get_edges(id)?.is_none() {
            self.kv.put_edges(id, &Edges::empty())?;
            self.counters.n.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    pub fn add_edge(&self, u: NodeId, w: NodeId) -> Result<()> {
        validate_id(u)?;
        validate_id(w)?;
        self.apply_half(u, w, Side::Out, self.config.out_policy, false)?;
        self.apply_half(w, u, Side::In, self.config.in_policy, false)?;
        Ok(())
    }

    pub fn delete_edge(&self, u: NodeId, w: NodeId) -> Result<()> {
        validate_id(u)?;
        validate_id(w)?;
        self.apply_half(u, w, Side::Out, self.config.out_policy, true)?;
        self.apply_half(w, u, Side::In, self.config.in_policy, true)?;
        Ok(())
    }

    fn apply_half(&self, owner: NodeId, target: NodeId, side: Side, configured: EdgeUpdatePolicy, is_delete: bool) -> Result<()> {
        let policy = self.effective_policy(configured, owner, is_delete);
        match policy {
            EdgeUpdatePolicy::Eager => self.apply_half_eager(owner, target, side, is_delete),
            EdgeUpdatePolicy::FullLazy => self.apply_half_full_lazy(owner, target, side, is_delete),
            EdgeUpdatePolicy::Lazy | EdgeUpdatePolicy::Adaptive => {
                self.apply_half_lazy(owner, target, side, is_delete)
            }
        }
    }

    /// Deletion under EFP encoding is always eager (tombstones cannot
    /// round-trip through the compressed codec). Otherwise `Adaptive`
    /// resolves to `Eager` or `Lazy` per the cost model.
    fn effective_policy(&self, configured: EdgeUpdatePolicy, owner: NodeId, is_delete: bool) -> EdgeUpdatePolicy {
        if is_delete && self.config.encoding_type == EncodingType::EliasFanoPartitioned {
            return EdgeUpdatePolicy::Eager;
        }
        if configured != EdgeUpdatePolicy::Adaptive {
            return configured;
        }
        if self.adaptive.refresh_due() {
            self.adaptive.set_shape(self.kv.level_shape());
        }
        let approx = self.approx_degree(owner);
        let eager = self.adaptive.decide_eager(
            approx,
            self.counters.m(),
            self.counters.n(),
            self.config.update_ratio,
            self.config.lookup_ratio,
        );
        if eager {
            EdgeUpdatePolicy::Eager
        } else {
            EdgeUpdatePolicy::Lazy
        }
    }

    fn apply_half_eager(&self, owner: NodeId, target: NodeId, side: Side, is_delete: bool) -> Result<()> {
        let mut edges = self.kv.get_edges(owner)?.unwrap_or_default();
        let changed = match (side, is_delete) {
            (Side::Out, false) => edges.insert_out(target),
            (Side::Out, true) => edges.remove_out(target),
            (Side::In, false) => edges.insert_in(target),
            (Side::In, true) => edges.remove_in(target),
        };
        if changed {
            self.kv.put_edges(owner, &edges)?;
            self.bump_sketches(owner, !is_delete);
            if side == Side::Out {
                self.bump_edge_count(is_delete);
            }
        } else {
            tracing::debug!(owner, target, "edge mutation was a no-op (duplicate add or missing delete target)");
        }
        Ok(())
    }

    fn apply_half_lazy(&self, owner: NodeId, target: NodeId, side: Side, is_delete: bool) -> Result<()> {
        let value = if is_delete { -target } else { target };
        match side {
            Side::Out => self.kv.merge_out(owner, value)?,
            Side::In => self.kv.merge_in(owner, value)?,
        }
        if !is_delete {
            self.bump_sketches(owner, true);
            if side == Side::Out {
                self.bump_edge_count(false);
            }
        }
        Ok(())
    }

    fn apply_half_full_lazy(&self, owner: NodeId, target: NodeId, side: Side, is_delete: bool) -> Result<()> {
        let value = if is_delete { -target } else { target };
        let delta = match side {
            Side::Out => Edges { out: vec![value], r#in: vec![] },
            Side::In => Edges { out: vec![], r#in: vec![value] },
        };
        let disambiguator = (target.unsigned_abs() & 0xFF) as u8;
        self.kv.put_full_lazy(owner, disambiguator, &delta)?;
        if !is_delete {
            self.bump_sketches(owner, true);
            if side == Side::Out {
                self.bump_edge_count(false);
            }
        }
        Ok(())
    }

    fn bump_edge_count(&self, is_delete: bool) {
        if is_delete {
            self.counters.m.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.counters.m.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn bump_sketches(&self, owner: NodeId, increment: bool) {
        if let Some(morris) = &self.morris {
            let idx = owner as usize;
            if increment {
                morris.increment(idx);
            } else {
                morris.decrement(idx);
            }
        }
        if let Some(cm) = &self.count_min {
            cm.write().unwrap().update(owner, if increment { 1 } else { -1 });
        }
    }

    fn approx_degree(&self, v: NodeId) -> u64 {
        if let Some(morris) = &self.morris {
            return morris.query(v as usize);
        }
        if let Some(cm) = &self.count_min {
            return cm.read().unwrap().estimate(v).max(0) as u64;
        }
        self.kv.get_edges(v).ok().flatten().map(|e| e.total_degree() as u64).unwrap_or(0)
    }

    // ── Read path ───────────────────────────────────────────────────

    pub fn get_all_edges(&self, v: NodeId) -> Result<Edges> {
        validate_id(v)?;
        if self.uses_full_lazy_layout() {
            self.kv.get_full_lazy(v)
        } else {
            Ok(self.kv.get_edges(v)?.unwrap_or_default())
        }
    }

    /// Whether either direction is configured for the `FullLazy`
    /// disambiguated-key layout, which requires the prefix-scan fold
    /// instead of a plain `Get`. `Adaptive` never resolves to `FullLazy`
    /// (see `effective_policy`), so only a literal `FullLazy` config
    /// triggers the scan path.
    fn uses_full_lazy_layout(&self) -> bool {
        self.config.out_policy == EdgeUpdatePolicy::FullLazy || self.config.in_policy == EdgeUpdatePolicy::FullLazy
    }

    pub fn get_out_degree(&self, v: NodeId) -> Result<usize> {
        Ok(self.get_all_edges(v)?.out_degree())
    }

    pub fn get_in_degree(&self, v: NodeId) -> Result<usize> {
        Ok(self.get_all_edges(v)?.in_degree())
    }

    pub fn get_degree_approximate(&self, v: NodeId) -> Result<u64> {
        validate_id(v)?;
        Ok(self.approx_degree(v))
    }

    pub fn random_walk(&self, start: NodeId, decay_factor: f64) -> Result<NodeId> {
        self.random_walk_with(start, decay_factor, &mut rand::thread_rng())
    }

    pub fn random_walk_with(&self, start: NodeId, decay_factor: f64, rng: &mut impl Rng) -> Result<NodeId> {
        validate_id(start)?;
        let mut current = start;
        loop {
            if rng.gen::<f64>() < decay_factor {
                return Ok(current);
            }
            let edges = self.get_all_edges(current)?;
            if edges.out.is_empty() {
                return Ok(current);
            }
            let idx = rng.gen_range(0..edges.out.len());
            current = edges.out[idx];
        }
    }

    // ── Bulk load ───────────────────────────────────────────────────

    /// Precompute the `(key, encoded_value)` pair for a vertex's full
    /// adjacency, for sorted SST writing by an offline loader. Updates
    /// `m` and the degree sketches but does not touch the store.
    pub fn add_edges_bulk(&self, id: NodeId, outs: Vec<NodeId>, r#in: Vec<NodeId>) -> Result<(Vec<u8>, Vec<u8>)> {
        validate_id(id)?;
        let edges = Edges { out: outs, r#in };
        if !edges.is_valid() {
            return Err(GraphError::InvalidArgument(
                "bulk-loaded edge lists must be sorted ascending with no negative ids".into(),
            ));
        }
        self.counters.m.fetch_add(edges.out.len() as i64, Ordering::SeqCst);
        if self.morris.is_some() || self.count_min.is_some() {
            for _ in 0..edges.total_degree() {
                self.bump_sketches(id, true);
            }
        }
        let value = codec::encode(&edges, self.config.encoding_type);
        Ok((crate::types::encode_key(id).to_vec(), value))
    }
}

fn validate_id(id: NodeId) -> Result<()> {
    if id < 0 {
        return Err(GraphError::InvalidArgument(format!(
            "vertex id {id} is negative; negative ids are reserved for internal tombstones"
        )));
    }
    Ok(())
}
