//! Adjacency codec: encode/decode an `Edges` record into a byte string.
//!
//! Two body formats share an 8-byte header (`num_edges_out: u32 BE`,
//! `num_edges_in: u32 BE`):
//!
//! - [`plain`]: raw 8-byte big-endian ids, one list after the other.
//! - [`elias_fano`]: a uniform-partitioned Elias-Fano code per list.

pub mod bitpack;
pub mod elias_fano;
pub mod plain;

use crate::config::EncodingType;
use crate::error::{GraphError, Result};
use crate::types::Edges;

const HEADER_SIZE: usize = 8;

/// Encode an `Edges` record under the given format.
pub fn encode(edges: &Edges, format: EncodingType) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + edges.total_degree() * 8);
    out.extend_from_slice(&(edges.out.len() as u32).to_be_bytes());
    out.extend_from_slice(&(edges.r#in.len() as u32).to_be_bytes());
    match format {
        EncodingType::Plain => plain::encode_body(edges, &mut out),
        EncodingType::EliasFanoPartitioned => elias_fano::encode_body(edges, &mut out),
    }
    out
}

/// Decode an `Edges` record previously produced by [`encode`] with the
/// same `format`.
pub fn decode(bytes: &[u8], format: EncodingType) -> Result<Edges> {
    if bytes.len() < HEADER_SIZE {
        return Err(GraphError::Corruption("adjacency record too short for header".into()));
    }
    let num_out = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let num_in = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let body = &bytes[HEADER_SIZE..];
    match format {
        EncodingType::Plain => plain::decode_body(body, num_out, num_in),
        EncodingType::EliasFanoPartitioned => elias_fano::decode_body(body, num_out, num_in),
    }
}
