//! Results accumulator: HSPs grouped by query/subject pair.
//!
//! This is the boundary object handed to whatever serialization layer the
//! surrounding application uses, and the only thing a driver mutates across
//! pair iterations. Groups keep their first-insertion order; HSPs within a
//! group can be sorted into reporting order.

use std::cmp::Ordering;
use std::io::{self, Write};

use rustc_hash::FxHashMap;

use crate::align::result::stats_from_edit_script;
use crate::hsp::Hsp;

/// All HSPs for one query/subject pair.
#[derive(Debug, Clone)]
pub struct PairAlignments {
    pub query_id: String,
    pub subject_id: String,
    pub hsps: Vec<Hsp>,
}

/// Ordered collection of pair groups, mergeable across aligner stages.
#[derive(Debug, Default)]
pub struct AlignmentSet {
    pairs: Vec<PairAlignments>,
    index: FxHashMap<(String, String), usize>,
}

impl AlignmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[PairAlignments] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.iter().all(|p| p.hsps.is_empty())
    }

    /// Total HSP count across all pairs.
    pub fn total_hsps(&self) -> usize {
        self.pairs.iter().map(|p| p.hsps.len()).sum()
    }

    /// Does this set already hold at least one HSP for the pair? Drivers use
    /// this to skip pairs an earlier stage has settled.
    pub fn has_hsps(&self, query_id: &str, subject_id: &str) -> bool {
        self.index
            .get(&(query_id.to_string(), subject_id.to_string()))
            .map(|&i| !self.pairs[i].hsps.is_empty())
            .unwrap_or(false)
    }

    pub fn pair(&self, query_id: &str, subject_id: &str) -> Option<&PairAlignments> {
        self.index
            .get(&(query_id.to_string(), subject_id.to_string()))
            .map(|&i| &self.pairs[i])
    }

    pub fn pair_mut(&mut self, query_id: &str, subject_id: &str) -> Option<&mut PairAlignments> {
        self.index
            .get(&(query_id.to_string(), subject_id.to_string()))
            .map(|&i| &mut self.pairs[i])
    }

    pub fn push_hsp(&mut self, query_id: &str, subject_id: &str, hsp: Hsp) {
        let key = (query_id.to_string(), subject_id.to_string());
        let idx = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.pairs.push(PairAlignments {
                    query_id: key.0.clone(),
                    subject_id: key.1.clone(),
                    hsps: Vec::new(),
                });
                let i = self.pairs.len() - 1;
                self.index.insert(key, i);
                i
            }
        };
        self.pairs[idx].hsps.push(hsp);
    }

    /// Sort each group's HSPs into reporting order: e-value ascending, then
    /// raw score descending, then subject and query offsets.
    pub fn sort_hsps(&mut self) {
        for pair in &mut self.pairs {
            pair.hsps.sort_by(compare_hsps);
        }
    }
}

/// Reporting comparator. E-values below 1e-180 compare equal so that
/// floating underflow does not scramble the order of very strong hits.
fn compare_hsps(a: &Hsp, b: &Hsp) -> Ordering {
    const EPSILON: f64 = 1.0e-180;
    let ev = if a.evalue < EPSILON && b.evalue < EPSILON {
        Ordering::Equal
    } else {
        a.evalue.partial_cmp(&b.evalue).unwrap_or(Ordering::Equal)
    };
    ev.then(b.score.cmp(&a.score))
        .then(a.subject.offset.cmp(&b.subject.offset))
        .then(a.query.offset.cmp(&b.query.offset))
}

/// Write the set as tab-separated rows: query, subject, % identity,
/// alignment length, mismatches, gap openings, 1-based endpoints, e-value,
/// bit score.
pub fn write_tabular(set: &AlignmentSet, out: &mut dyn Write) -> io::Result<()> {
    for pair in set.pairs() {
        for hsp in &pair.hsps {
            let (len, mismatches, gap_opens) = match &hsp.edit {
                Some(ops) => {
                    let st = stats_from_edit_script(ops);
                    (st.alignment_len, st.mismatches, st.gap_opens)
                }
                None => (hsp.query.len().max(hsp.subject.len()) as usize, 0, 0),
            };
            let identity = if len > 0 {
                100.0 * hsp.num_ident as f64 / len as f64
            } else {
                0.0
            };
            writeln!(
                out,
                "{}\t{}\t{:.3}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1e}\t{:.1}",
                pair.query_id,
                pair.subject_id,
                identity,
                len,
                mismatches,
                gap_opens,
                hsp.query.offset + 1,
                hsp.query.end,
                hsp.subject.offset + 1,
                hsp.subject.end,
                hsp.evalue,
                hsp.bit_score,
            )?;
        }
    }
    Ok(())
}
