//! `GraphMeta.log` sidecar: persists vertex/edge counters and the Morris
//! counter byte vector across restarts. Little-endian, fixed layout.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::Result;

const FILE_NAME: &str = "GraphMeta.log";

#[derive(Debug, Clone)]
pub struct GraphMeta {
    pub n: i64,
    pub m: i64,
    pub morris_bytes: Vec<u8>,
    pub morris_exponent_bits: i32,
    pub morris_mantissa_bits: i32,
}

impl GraphMeta {
    pub fn path_for(db_path: &Path) -> std::path::PathBuf {
        db_path.join(FILE_NAME)
    }

    pub fn write_to(&self, db_path: &Path) -> Result<()> {
        let mut buf = Vec::with_capacity(24 + self.morris_bytes.len());
        buf.extend_from_slice(&self.n.to_le_bytes());
        buf.extend_from_slice(&self.m.to_le_bytes());
        buf.extend_from_slice(&(self.morris_bytes.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.morris_bytes);
        buf.extend_from_slice(&self.morris_exponent_bits.to_le_bytes());
        buf.extend_from_slice(&self.morris_mantissa_bits.to_le_bytes());

        let path = Self::path_for(db_path);
        let tmp_path = path.with_extension("log.tmp");
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(&buf)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Read the sidecar, or return `None` if it is absent or too short
    /// to parse (fresh counters should be used in either case).
    pub fn read_from(db_path: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(db_path);
        let mut f = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;

        if buf.len() < 24 {
            return Ok(None);
        }
        let n = i64::from_le_bytes(buf[0..8].try_into().unwrap());
        let m = i64::from_le_bytes(buf[8..16].try_into().unwrap());
        let morris_len = u64::from_le_bytes(buf[16..24].try_into().unwrap()) as usize;

        let tail_start = 24 + morris_len;
        if buf.len() < tail_start + 8 {
            return Ok(None);
        }
        let morris_bytes = buf[24..tail_start].to_vec();
        let morris_exponent_bits = i32::from_le_bytes(buf[tail_start..tail_start + 4].try_into().unwrap());
        let morris_mantissa_bits =
            i32::from_le_bytes(buf[tail_start + 4..tail_start + 8].try_into().unwrap());

        Ok(Some(Self {
            n,
            m,
            morris_bytes,
            morris_exponent_bits,
            morris_mantissa_bits,
        }))
    }
}
