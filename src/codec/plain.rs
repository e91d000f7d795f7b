//! Plain adjacency body: raw 8-byte big-endian ids, out-list then in-list.

use crate::error::{GraphError, Result};
use crate::types::{Edges, NodeId};

pub fn encode_body(edges: &Edges, out: &mut Vec<u8>) {
    for &id in &edges.out {
        out.extend_from_slice(&id.to_be_bytes());
    }
    for &id in &edges.r#in {
        out.extend_from_slice(&id.to_be_bytes());
    }
}

pub fn decode_body(body: &[u8], num_out: usize, num_in: usize) -> Result<Edges> {
    let expected = (num_out + num_in) * 8;
    if body.len() != expected {
        return Err(GraphError::Corruption(format!(
            "plain body length {} does not match declared counts (expected {})",
            body.len(),
            expected
        )));
    }
    let mut out = Vec::with_capacity(num_out);
    let mut r#in = Vec::with_capacity(num_in);
    let mut cursor = 0;
    for _ in 0..num_out {
        out.push(read_id(body, cursor));
        cursor += 8;
    }
    for _ in 0..num_in {
        r#in.push(read_id(body, cursor));
        cursor += 8;
    }
    Ok(Edges { out, r#in })
}

fn read_id(body: &[u8], at: usize) -> NodeId {
    NodeId::from_be_bytes(body[at..at + 8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_body() {
        let err = decode_body(&[0u8; 4], 1, 0).unwrap_err();
        assert!(err.to_string().contains("plain body length"));
    }

    #[test]
    fn roundtrip() {
        let e = Edges {
            out: vec![1, 2, 3],
            r#in: vec![4, 5],
        };
        let mut buf = Vec::new();
        encode_body(&e, &mut buf);
        assert_eq!(decode_body(&buf, 3, 2).unwrap(), e);
    }
}
