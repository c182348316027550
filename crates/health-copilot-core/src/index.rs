//! Flat inner-product vector index and its binary encoding.
//!
//! Vectors are stored contiguously in insertion order; position `i` is the
//! `i`-th vector added. Search is exhaustive: every stored vector is scored
//! against the query, which keeps results exact and deterministic.
//!
//! # Binary layout
//!
//! All integers and floats are little-endian.
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0 | 4 | magic `HCVI` |
//! | 4 | 4 | format version (`u32`, currently 1) |
//! | 8 | 4 | dims (`u32`) |
//! | 12 | 8 | count (`u64`) |
//! | 20 | 36 | generation id (UUID string) |
//! | 56 | count × dims × 4 | vectors |

use std::cmp::Ordering;

use crate::embedding::dot;
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"HCVI";
const FORMAT_VERSION: u32 = 1;
const GENERATION_LEN: usize = 36;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + GENERATION_LEN;

/// Exhaustive inner-product index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::configuration("index dimension must be > 0"));
        }
        Ok(Self {
            dims,
            data: Vec::new(),
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector; it receives position `self.len()`.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dims(vector.len())?;
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dims)?;
        self.data.get(start..start + self.dims)
    }

    /// Top `k` positions by descending inner product.
    ///
    /// Scores are clamped to `[-1, 1]`. Ties are broken by ascending
    /// position. Returns `min(k, len)` pairs.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dims(query.len())?;

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(pos, v)| (pos, dot(query, v).clamp(-1.0, 1.0)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn check_dims(&self, got: usize) -> Result<()> {
        if got != self.dims {
            return Err(Error::configuration(format!(
                "vector dimension {} does not match index dimension {}",
                got, self.dims
            )));
        }
        Ok(())
    }

    /// Encode the index, stamping it with `generation`.
    pub fn to_bytes(&self, generation: &str) -> Result<Vec<u8>> {
        if generation.len() != GENERATION_LEN {
            return Err(Error::configuration(format!(
                "generation id must be {} bytes, got {}",
                GENERATION_LEN,
                generation.len()
            )));
        }
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(generation.as_bytes());
        for &v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Decode an index, returning it with the generation id it carries.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, String)> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
            return Err(Error::configuration("index file is not a Health Copilot index"));
        }
        let version = u32::from_le_bytes(read_array(bytes, 4));
        if version != FORMAT_VERSION {
            return Err(Error::configuration(format!(
                "unsupported index format version {}",
                version
            )));
        }
        let dims = u32::from_le_bytes(read_array(bytes, 8)) as usize;
        let count = u64::from_le_bytes(read_array(bytes, 12)) as usize;
        let generation = std::str::from_utf8(&bytes[20..HEADER_LEN])
            .map_err(|_| Error::configuration("index generation id is not UTF-8"))?
            .to_string();

        let body = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::configuration("index header overflows"))?;
        if body.len() != expected {
            return Err(Error::configuration(format!(
                "index body holds {} bytes, header promises {}",
                body.len(),
                expected
            )));
        }

        let mut index = Self::new(dims)?;
        index.data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok((index, generation))
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
