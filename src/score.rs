//! Score and statistics builder.
//!
//! [`ScoringConfig`] is assembled once per search — matrix, gap costs,
//! Karlin-Altschul parameters, effective search space — and read-only from
//! then on; it is passed by reference into every scoring call rather than
//! living in any global. [`ScoreBuilder`] layers the derived quantities on
//! top: raw score over a column range, bit score, e-value, and the rendered
//! traceback rows.

use std::ops::Range;

use crate::align::result::EditOp;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::matrix::SubstMatrix;
use crate::stats::{bit_score, evalue_from_raw, KarlinParams, SearchSpace};

/// Which derived quantity a score computation should yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Raw,
    Bit,
    EValue,
}

/// Immutable-after-construction scoring configuration shared by all scoring
/// calls of a search.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub matrix: SubstMatrix,
    gap_open: i32,
    gap_extend: i32,
    pub karlin: KarlinParams,
    effective_search_space: Option<SearchSpace>,
}

impl ScoringConfig {
    /// Gap costs start at zero — a documented default for ungapped use, not
    /// an error — and the effective search space starts unset, which IS a
    /// fatal precondition for e-values.
    pub fn new(matrix: SubstMatrix, karlin: KarlinParams) -> Self {
        Self {
            matrix,
            gap_open: 0,
            gap_extend: 0,
            karlin,
            effective_search_space: None,
        }
    }

    pub fn set_gap_open(&mut self, cost: i32) {
        self.gap_open = cost;
    }

    pub fn set_gap_extend(&mut self, cost: i32) {
        self.gap_extend = cost;
    }

    pub fn set_effective_search_space(&mut self, space: SearchSpace) {
        self.effective_search_space = Some(space);
    }

    pub fn gap_open(&self) -> i32 {
        self.gap_open
    }

    pub fn gap_extend(&self) -> i32 {
        self.gap_extend
    }

    pub fn effective_search_space(&self) -> Option<&SearchSpace> {
        self.effective_search_space.as_ref()
    }

    /// Composition-based score adjustment is not carried by this engine.
    /// Requesting it reports an unsupported-configuration diagnostic once,
    /// at configuration time; standard Karlin-Altschul scoring remains the
    /// fallback, so the request is non-fatal.
    pub fn request_composition_stats(&self) -> Result<(), Diagnostic> {
        Err(Diagnostic::new(
            Severity::Error,
            DiagnosticCode::UnsupportedConfig,
            "composition-based statistics are not supported for this configuration",
        ))
    }
}

/// One gapped alignment viewed as residues plus an edit script, the input
/// shape for score recomputation and traceback rendering.
#[derive(Debug, Clone, Copy)]
pub struct GappedAlignment<'a> {
    pub query: &'a [u8],
    pub subject: &'a [u8],
    /// Query offset of the first alignment column (0-based)
    pub q_start: usize,
    /// Subject offset of the first alignment column (0-based)
    pub s_start: usize,
    pub ops: &'a [EditOp],
}

impl GappedAlignment<'_> {
    pub fn columns(&self) -> usize {
        self.ops.len()
    }
}

/// Derives reportable scores from alignments under one [`ScoringConfig`].
#[derive(Debug, Clone)]
pub struct ScoreBuilder {
    config: ScoringConfig,
}

impl ScoreBuilder {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Sum matrix entries and gap charges over the alignment columns in
    /// `range` (`None` means every column), then derive `kind`.
    ///
    /// A range outside the alignment's span is an invalid-parameter
    /// diagnostic; the call produces no value and the batch carries on.
    pub fn compute_score(
        &self,
        aln: &GappedAlignment<'_>,
        range: Option<Range<usize>>,
        kind: ScoreKind,
    ) -> Result<f64, Diagnostic> {
        let columns = aln.columns();
        let range = range.unwrap_or(0..columns);
        if range.start > range.end || range.end > columns {
            return Err(Diagnostic::new(
                Severity::Error,
                DiagnosticCode::InvalidParameter,
                format!(
                    "column range {}..{} outside alignment of {} columns",
                    range.start, range.end, columns
                ),
            ));
        }

        let raw = self.raw_over_range(aln, range);
        match kind {
            ScoreKind::Raw => Ok(raw as f64),
            ScoreKind::Bit => Ok(self.blast_bit_score(raw)),
            ScoreKind::EValue => self.blast_evalue(raw),
        }
    }

    fn raw_over_range(&self, aln: &GappedAlignment<'_>, range: Range<usize>) -> i32 {
        let mut qi = aln.q_start;
        let mut si = aln.s_start;
        let mut score = 0i32;
        let mut prev: Option<EditOp> = None;

        for (col, &op) in aln.ops.iter().enumerate() {
            let in_range = range.contains(&col);
            match op {
                EditOp::Match | EditOp::Mismatch => {
                    if in_range {
                        score += self.config.matrix.score(aln.query[qi], aln.subject[si]);
                    }
                    qi += 1;
                    si += 1;
                }
                EditOp::Ins => {
                    if in_range {
                        score -= self.config.gap_extend;
                        if prev != Some(EditOp::Ins) {
                            score -= self.config.gap_open;
                        }
                    }
                    qi += 1;
                }
                EditOp::Del => {
                    if in_range {
                        score -= self.config.gap_extend;
                        if prev != Some(EditOp::Del) {
                            score -= self.config.gap_open;
                        }
                    }
                    si += 1;
                }
            }
            prev = Some(op);
        }
        score
    }

    /// Raw integer score over the whole alignment.
    pub fn blast_score(&self, aln: &GappedAlignment<'_>) -> i32 {
        self.raw_over_range(aln, 0..aln.columns())
    }

    /// Bit score of a raw score.
    pub fn blast_bit_score(&self, raw: i32) -> f64 {
        bit_score(raw, &self.config.karlin)
    }

    /// E-value of a raw score.
    ///
    /// The effective search space must have been set; calling without one is
    /// a fatal precondition violation, reported through the diagnostic
    /// channel rather than silently defaulted.
    pub fn blast_evalue(&self, raw: i32) -> Result<f64, Diagnostic> {
        let Some(space) = self.config.effective_search_space() else {
            return Err(Diagnostic::new(
                Severity::Fatal,
                DiagnosticCode::InvalidParameter,
                "effective search space not set before e-value computation",
            )
            .with_origin(file!(), line!()));
        };
        Ok(evalue_from_raw(raw, &self.config.karlin, space))
    }

    /// Render the three traceback rows — query, midline, subject — with '-'
    /// for gap columns and '|' marking identities.
    pub fn traceback_strings(&self, aln: &GappedAlignment<'_>) -> (String, String, String) {
        let mut qrow = String::with_capacity(aln.columns());
        let mut mid = String::with_capacity(aln.columns());
        let mut srow = String::with_capacity(aln.columns());

        let mut qi = aln.q_start;
        let mut si = aln.s_start;
        for &op in aln.ops {
            match op {
                EditOp::Match | EditOp::Mismatch => {
                    let q = aln.query[qi] as char;
                    let s = aln.subject[si] as char;
                    qrow.push(q);
                    srow.push(s);
                    mid.push(if op == EditOp::Match { '|' } else { ' ' });
                    qi += 1;
                    si += 1;
                }
                EditOp::Ins => {
                    qrow.push(aln.query[qi] as char);
                    srow.push('-');
                    mid.push(' ');
                    qi += 1;
                }
                EditOp::Del => {
                    qrow.push('-');
                    srow.push(aln.subject[si] as char);
                    mid.push(' ');
                    si += 1;
                }
            }
        }

        (qrow, mid, srow)
    }
}
