//! Local pairwise sequence-alignment search and scoring.
//!
//! The crate is organized leaves-first: a numeric kernel ([`math`]), the HSP
//! record and sum-statistics linking model ([`hsp`]), Karlin-Altschul
//! statistics and calibration ([`stats`]), the score builder ([`score`]),
//! and the banded/instanced aligner drivers ([`align`]). Sequence storage is
//! external: residues arrive through [`sequence::SequenceSource`] and
//! results leave through [`results::AlignmentSet`]. Failures are collected
//! in a [`diagnostics::DiagnosticList`] instead of aborting the batch.

pub mod align;
pub mod diagnostics;
pub mod hsp;
pub mod math;
pub mod matrix;
pub mod results;
pub mod score;
pub mod sequence;
pub mod stats;
