//! Sequence input boundary.
//!
//! The engine never owns sequence storage: residues are fetched lazily
//! through a [`SequenceSource`], which stands in for whatever object-manager
//! or database layer the surrounding application uses. The bundled
//! [`MemorySequenceSource`] covers the CLI and tests.

use std::ops::Range;

use anyhow::{anyhow, Result};
use rustc_hash::FxHashMap;

/// Strand of a sequence region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Frame indicator stored on HSP segments: +1 forward, -1 reverse.
    pub fn frame(self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

/// A named sequence region with strand and an optional sub-range.
#[derive(Debug, Clone)]
pub struct SeqRegion {
    pub id: String,
    pub strand: Strand,
    pub range: Option<Range<usize>>,
}

impl SeqRegion {
    pub fn new(id: impl Into<String>, strand: Strand) -> Self {
        Self {
            id: id.into(),
            strand,
            range: None,
        }
    }

    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }
}

/// Capability to fetch raw residues for a sequence id.
///
/// `range` of `None` means the whole sequence. Implementations must return an
/// error (not truncate silently) when the id is unknown or the range falls
/// outside the sequence.
pub trait SequenceSource {
    fn fetch(&self, id: &str, range: Option<&Range<usize>>) -> Result<Vec<u8>>;
}

/// In-memory sequence source backed by a hash map.
#[derive(Debug, Default)]
pub struct MemorySequenceSource {
    seqs: FxHashMap<String, Vec<u8>>,
}

impl MemorySequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, seq: impl Into<Vec<u8>>) {
        self.seqs.insert(id.into(), seq.into());
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }
}

impl SequenceSource for MemorySequenceSource {
    fn fetch(&self, id: &str, range: Option<&Range<usize>>) -> Result<Vec<u8>> {
        let seq = self
            .seqs
            .get(id)
            .ok_or_else(|| anyhow!("unknown sequence id: {id}"))?;
        match range {
            None => Ok(seq.clone()),
            Some(r) => {
                if r.start > r.end || r.end > seq.len() {
                    return Err(anyhow!(
                        "range {}..{} outside sequence {id} (len {})",
                        r.start,
                        r.end,
                        seq.len()
                    ));
                }
                Ok(seq[r.clone()].to_vec())
            }
        }
    }
}

/// Reverse complement of an IUPAC nucleotide sequence. Unrecognized residues
/// pass through as 'N'.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' | b'U' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            b'R' => b'Y',
            b'Y' => b'R',
            b'S' => b'S',
            b'W' => b'W',
            b'K' => b'M',
            b'M' => b'K',
            b'B' => b'V',
            b'V' => b'B',
            b'D' => b'H',
            b'H' => b'D',
            _ => b'N',
        })
        .collect()
}
