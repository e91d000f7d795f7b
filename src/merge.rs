//! Associative merge operator: consolidates adjacency deltas into a
//! sorted, deduplicated `Edges` record, applying tombstones.
//!
//! Registered with the underlying store under the name
//! [`MERGE_OPERATOR_NAME`]. Two entry points mirror RocksDB's merge
//! operator contract: [`full_merge`] folds a base value plus any number
//! of operands; [`partial_merge`] combines two operands in the absence
//! of a base, preserving tombstones for later resolution.

use crate::config::EncodingType;
use crate::codec;
use crate::types::{is_tombstone, Edges, NodeId};

pub const MERGE_OPERATOR_NAME: &str = "AdjacentListMergeOp";

/// Outcome of folding deltas into a base record: the resulting record
/// plus the net change in live edge count (for `m` bookkeeping).
pub struct MergeOutcome {
    pub edges: Edges,
    pub out_delta: i64,
}

/// Full merge: `base` (possibly empty, i.e. the vertex was never
/// written) combined with every pending `operand`, in apply order.
pub fn full_merge(base: Edges, operands: impl IntoIterator<Item = Edges>) -> MergeOutcome {
    let mut acc = base;
    let mut out_delta = 0i64;
    for operand in operands {
        out_delta += merge_side(&mut acc.out, operand.out, true);
        merge_side(&mut acc.r#in, operand.r#in, false);
    }
    MergeOutcome { edges: acc, out_delta }
}

/// Partial merge: combine two operands with no base in view. Tombstones
/// remain in the output as negative entries so a later full merge can
/// resolve them against a base.
pub fn partial_merge(a: Edges, b: Edges) -> Edges {
    Edges {
        out: merge_operand_pair(a.out, b.out),
        r#in: merge_operand_pair(a.r#in, b.r#in),
    }
}

/// Two-pointer sorted merge of `delta` into `side` (either the `out` or
/// `in` list), applying tombstones and deduplicating. `count_edges`
/// selects whether matches/tombstone-resolutions should be reflected in
/// the returned edge-count delta (only the `out` side feeds `m`, to
/// avoid double-counting the mirrored `in` update).
///
/// Lazy dispatch already increments `m` eagerly for every add operand
/// before it ever reaches here (it has no way to know in advance
/// whether the neighbor is already present). So a genuinely new insert
/// contributes no further delta — the count was already right. Only two
/// cases need a correction: an add that turns out to be a duplicate
/// (cancel the earlier over-count) and a tombstone that resolves
/// against a real entry (apply the decrement a lazy delete deferred).
///
/// Returns the net correction to the live edge count contributed by
/// this merge.
fn merge_side(side: &mut Vec<NodeId>, delta: Vec<NodeId>, count_edges: bool) -> i64 {
    let mut tombstones: Vec<NodeId> = Vec::new();
    let mut result = Vec::with_capacity(side.len() + delta.len());
    let mut net = 0i64;

    let mut a = side.drain(..).peekable();
    let mut b = delta.into_iter().peekable();

    loop {
        // Drain any delta tombstones that sort before the next base
        // element, recording them so later base elements can be culled.
        while let Some(&bv) = b.peek() {
            if is_tombstone(bv) {
                tombstones.push(-bv);
                b.next();
            } else {
                break;
            }
        }

        // Invariant: the draining loop above guarantees that if `b` still
        // has an element, it is not a tombstone.
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => break,
            (Some(av), None) => {
                a.next();
                if tombstones.contains(&av) {
                    tombstones.retain(|&t| t != av);
                    if count_edges {
                        net -= 1;
                    }
                } else {
                    result.push(av);
                }
            }
            (None, Some(bv)) => {
                b.next();
                result.push(bv);
            }
            (Some(av), Some(bv)) => {
                if tombstones.contains(&av) {
                    a.next();
                    tombstones.retain(|&t| t != av);
                    if count_edges {
                        net -= 1;
                    }
                    continue;
                }
                if av == bv {
                    a.next();
                    b.next();
                    if count_edges {
                        net -= 1;
                    }
                    result.push(av);
                } else if av < bv {
                    a.next();
                    result.push(av);
                } else {
                    b.next();
                    result.push(bv);
                }
            }
        }
    }

    *side = result;
    net
}

/// Combine two delta lists with no base: a plain sorted merge that keeps
/// tombstones as negative entries. When both operands touch the same
/// neighbor (an add and its tombstone, in either order), the later
/// operand `b` wins and is the only one kept — a tombstone must stay
/// visible so a later full merge against a base can apply it; silently
/// dropping both would let a delete vanish before it ever reaches the
/// base.
fn merge_operand_pair(a: Vec<NodeId>, b: Vec<NodeId>) -> Vec<NodeId> {
    let mut result: Vec<NodeId> = Vec::with_capacity(a.len() + b.len());
    let mut ai = a.into_iter().peekable();
    let mut bi = b.into_iter().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => break,
            (Some(x), None) => {
                ai.next();
                result.push(x);
            }
            (None, Some(y)) => {
                bi.next();
                result.push(y);
            }
            (Some(x), Some(y)) => {
                if x.abs() == y.abs() {
                    ai.next();
                    bi.next();
                    result.push(y);
                } else if x.abs() < y.abs() {
                    ai.next();
                    result.push(x);
                } else {
                    bi.next();
                    result.push(y);
                }
            }
        }
    }
    result.sort_by_key(|v| v.abs());
    result
}

/// Decode the stored base value (if any), fold in the operands, and
/// re-encode. Used directly by the RocksDB merge-operator callbacks in
/// [`crate::kv`].
pub fn full_merge_bytes(
    existing: Option<&[u8]>,
    operands: impl Iterator<Item = Edges>,
    format: EncodingType,
) -> Option<(Vec<u8>, i64)> {
    let base = match existing {
        Some(bytes) => codec::decode(bytes, format).ok()?,
        None => Edges::empty(),
    };
    let outcome = full_merge(base, operands);
    Some((codec::encode(&outcome.edges, format), outcome.out_delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(out: Vec<NodeId>, r#in: Vec<NodeId>) -> Edges {
        Edges { out, r#in }
    }

    #[test]
    fn simple_add_needs_no_correction() {
        // The dispatcher already counted this add eagerly; a genuinely
        // new entry needs no further adjustment at merge time.
        let base = e(vec![1, 3], vec![]);
        let delta = e(vec![2], vec![]);
        let outcome = full_merge(base, [delta]);
        assert_eq!(outcome.edges.out, vec![1, 2, 3]);
        assert_eq!(outcome.out_delta, 0);
    }

    #[test]
    fn duplicate_add_corrects_the_eager_overcount() {
        let base = e(vec![1, 2, 3], vec![]);
        let delta = e(vec![2], vec![]);
        let outcome = full_merge(base, [delta]);
        assert_eq!(outcome.edges.out, vec![1, 2, 3]);
        assert_eq!(outcome.out_delta, -1);
    }

    #[test]
    fn tombstone_removes_existing() {
        let base = e(vec![1, 2, 3], vec![]);
        let delta = e(vec![-2], vec![]);
        let outcome = full_merge(base, [delta]);
        assert_eq!(outcome.edges.out, vec![1, 3]);
        assert_eq!(outcome.out_delta, -1);
    }

    #[test]
    fn tombstone_on_absent_neighbor_is_noop() {
        let base = e(vec![1, 3], vec![]);
        let delta = e(vec![-2], vec![]);
        let outcome = full_merge(base, [delta]);
        assert_eq!(outcome.edges.out, vec![1, 3]);
        assert_eq!(outcome.out_delta, 0);
    }

    #[test]
    fn lazy_add_add_delete_folds_to_empty() {
        // Scenario S2: AddEdge(1,2), AddEdge(1,2), DeleteEdge(1,2).
        let base = Edges::empty();
        let d1 = e(vec![2], vec![]);
        let d2 = e(vec![2], vec![]);
        let d3 = e(vec![-2], vec![]);
        let outcome = full_merge(base, [d1, d2, d3]);
        assert_eq!(outcome.edges.out, Vec::<NodeId>::new());
    }

    #[test]
    fn partial_merge_preserves_tombstone() {
        // Scenario S3: pending deltas (+2) and (-2) for the same vertex
        // are partial-merged with no base in view. The tombstone must
        // survive in the combined operand so a later full merge can
        // apply it against a stale base that still holds 2.
        let a = e(vec![2], vec![]);
        let b = e(vec![-2], vec![]);
        let combined = partial_merge(a, b);
        assert_eq!(combined.out, vec![-2]);

        let base = e(vec![2], vec![]);
        let outcome = full_merge(base, [combined]);
        assert!(outcome.edges.out.is_empty());

        // A tombstone with nothing to cancel survives as a negative entry.
        let c = e(vec![-5], vec![]);
        let d = e(vec![7], vec![]);
        let combined2 = partial_merge(c, d);
        assert!(combined2.out.contains(&-5));
        assert!(combined2.out.contains(&7));

        // Later, a full merge against a base containing 5 resolves it.
        let base = e(vec![5, 7], vec![]);
        let outcome = full_merge(base, [combined2]);
        assert_eq!(outcome.edges.out, vec![7]);
    }

    #[test]
    fn merge_is_order_independent_for_commuting_ops() {
        let base = e(vec![1, 5], vec![]);
        let d1 = e(vec![3], vec![]);
        let d2 = e(vec![2], vec![]);
        let out1 = full_merge(base.clone(), [d1.clone(), d2.clone()]).edges;
        let out2 = full_merge(base, [d2, d1]).edges;
        assert_eq!(out1, out2);
    }
}
