//! Aligner drivers: shared contract plus the two concrete strategies.
//!
//! Both drivers walk the query×subject pair grid, fetch residues through the
//! injected scope, align, and merge the surviving HSPs into the accumulator
//! they were handed. Pairs the accumulator already settled are skipped, so
//! stages compose: run the banded driver first, then the instanced driver
//! over whatever it rejected.
//!
//! Per pair the lifecycle is Pending → Extending → one of Succeeded, Failed,
//! or TimedOut, with no retries. A below-threshold alignment is a Succeeded
//! pair with no result, not a failure. Only a fatal diagnostic (missing
//! effective search space at e-value time, or a batch whose every query
//! failed setup) stops the whole batch.

use std::time::{Duration, Instant};

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticList, Severity};
use crate::hsp::link::{link_hsps, LinkingParams};
use crate::hsp::{Hsp, Seg};
use crate::results::AlignmentSet;
use crate::score::{ScoreBuilder, ScoringConfig};
use crate::sequence::{SeqRegion, SequenceSource, Strand};

use super::banded::{best_diagonal, global_banded, local_align, LocalResult};
use super::result::{stats_from_edit_script, AlignOutcome};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lifecycle of one query/subject pair inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Pending,
    Extending,
    Succeeded,
    Failed,
    TimedOut,
}

/// The contract both aligner strategies implement.
pub trait AlignmentEngine {
    /// Align every query/subject pair, merging new HSPs into `prior` and
    /// appending per-pair failures to `diags`. Pairs for which `prior`
    /// already holds HSPs are skipped. An empty query or subject set returns
    /// `prior` untouched with no diagnostics.
    fn generate_alignments(
        &self,
        scope: &dyn SequenceSource,
        queries: &[SeqRegion],
        subjects: &[SeqRegion],
        prior: AlignmentSet,
        diags: &mut DiagnosticList,
    ) -> AlignmentSet;
}

/// Fetch residues for each region, reverse-complementing reverse-strand
/// regions. Failures become per-region warnings; the pair grid simply skips
/// the holes.
fn fetch_regions(
    scope: &dyn SequenceSource,
    regions: &[SeqRegion],
    label: &str,
    diags: &mut DiagnosticList,
) -> Vec<Option<Vec<u8>>> {
    regions
        .iter()
        .map(|r| match scope.fetch(&r.id, r.range.as_ref()) {
            Ok(seq) => {
                if r.strand == Strand::Reverse {
                    Some(crate::sequence::reverse_complement(&seq))
                } else {
                    Some(seq)
                }
            }
            Err(e) => {
                diags.push(Diagnostic::new(
                    Severity::Warning,
                    DiagnosticCode::FetchFailed,
                    format!("{label} {}: {e}", r.id),
                ));
                None
            }
        })
        .collect()
}

fn build_hsp(
    scorer: &ScoreBuilder,
    out: AlignOutcome,
    q_frame: i8,
    s_frame: i8,
    context: i32,
) -> Result<Hsp, Diagnostic> {
    let stats = stats_from_edit_script(&out.ops);
    let query = Seg::new(out.q_start as i32, out.q_end as i32, q_frame);
    let subject = Seg::new(out.s_start as i32, out.s_end as i32, s_frame);
    let mut hsp = Hsp::new(query, subject, out.score, context);
    hsp.num_ident = stats.matches as i32;
    hsp.bit_score = scorer.blast_bit_score(out.score);
    hsp.evalue = scorer.blast_evalue(out.score)?;
    hsp.edit = Some(out.ops);
    Ok(hsp)
}

fn query_context(qi: usize, strand: Strand) -> i32 {
    (qi as i32) * 2 + if strand == Strand::Reverse { 1 } else { 0 }
}

/// Apply sum-statistics linking to every pair group this batch touched.
fn link_touched_pairs(
    set: &mut AlignmentSet,
    touched: &mut Vec<(String, String)>,
    scorer: &ScoreBuilder,
    linking: &LinkingParams,
) {
    let Some(space) = scorer.config().effective_search_space().copied() else {
        return;
    };
    touched.sort();
    touched.dedup();
    for (q, s) in touched.iter() {
        if let Some(pair) = set.pair_mut(q, s) {
            if pair.hsps.len() >= 2 {
                link_hsps(&mut pair.hsps, linking, &scorer.config().karlin, &space);
            }
        }
    }
}

/// Banded global aligner: one best-diagonal banded alignment per pair.
///
/// The band half-width is `band_width / 2` around the most-voted seed
/// diagonal; a pair whose banded score does not exceed `threshold` (or whose
/// band cannot hold a global path) contributes no result.
pub struct SimpleBandedAligner {
    threshold: i32,
    band_width: usize,
    word_size: usize,
    scorer: ScoreBuilder,
    linking: LinkingParams,
}

impl SimpleBandedAligner {
    pub fn new(threshold: i32, band_width: usize, config: ScoringConfig) -> Self {
        let linking =
            LinkingParams::default().with_gap_costs(config.gap_open(), config.gap_extend());
        Self {
            threshold,
            band_width,
            word_size: 8,
            scorer: ScoreBuilder::new(config),
            linking,
        }
    }

    /// Seed word length for the diagonal vote (default 8).
    pub fn with_word_size(mut self, word_size: usize) -> Self {
        self.word_size = word_size.max(1);
        self
    }
}

impl AlignmentEngine for SimpleBandedAligner {
    fn generate_alignments(
        &self,
        scope: &dyn SequenceSource,
        queries: &[SeqRegion],
        subjects: &[SeqRegion],
        prior: AlignmentSet,
        diags: &mut DiagnosticList,
    ) -> AlignmentSet {
        if queries.is_empty() || subjects.is_empty() {
            return prior;
        }

        let qseqs = fetch_regions(scope, queries, "query", diags);
        if qseqs.iter().all(Option::is_none) {
            diags.push(Diagnostic::new(
                Severity::Fatal,
                DiagnosticCode::AllQueriesInvalid,
                "every query in the batch failed setup",
            ));
            return prior;
        }
        let sseqs = fetch_regions(scope, subjects, "subject", diags);

        let mut tasks: Vec<(usize, usize)> = Vec::new();
        for qi in 0..queries.len() {
            for si in 0..subjects.len() {
                if qseqs[qi].is_none() || sseqs[si].is_none() {
                    continue;
                }
                if prior.has_hsps(&queries[qi].id, &subjects[si].id) {
                    continue;
                }
                tasks.push((qi, si));
            }
        }

        let half = self.band_width / 2;
        let worker = |&(qi, si): &(usize, usize)| -> Result<Option<Hsp>, Diagnostic> {
            let qseq = qseqs[qi].as_deref().unwrap();
            let sseq = sseqs[si].as_deref().unwrap();
            let cfg = self.scorer.config();
            let seed_diag = best_diagonal(qseq, sseq, self.word_size);
            match global_banded(
                qseq,
                sseq,
                seed_diag,
                half,
                &cfg.matrix,
                cfg.gap_open(),
                cfg.gap_extend(),
            ) {
                Some(out) if out.score > self.threshold => build_hsp(
                    &self.scorer,
                    out,
                    queries[qi].strand.frame(),
                    subjects[si].strand.frame(),
                    query_context(qi, queries[qi].strand),
                )
                .map(Some),
                _ => Ok(None),
            }
        };

        // the per-pair step is independent work; collection preserves task
        // order so the merged output is deterministic either way
        #[cfg(feature = "parallel")]
        let outputs: Vec<Result<Option<Hsp>, Diagnostic>> = tasks.par_iter().map(worker).collect();
        #[cfg(not(feature = "parallel"))]
        let outputs: Vec<Result<Option<Hsp>, Diagnostic>> = tasks.iter().map(worker).collect();

        let mut set = prior;
        let mut touched: Vec<(String, String)> = Vec::new();
        for (&(qi, si), out) in tasks.iter().zip(outputs) {
            match out {
                Ok(Some(hsp)) => {
                    set.push_hsp(&queries[qi].id, &subjects[si].id, hsp);
                    touched.push((queries[qi].id.clone(), subjects[si].id.clone()));
                }
                Ok(None) => {}
                Err(d) => {
                    let fatal = d.is_fatal();
                    diags.push(d);
                    if fatal {
                        return set;
                    }
                }
            }
        }

        link_touched_pairs(&mut set, &mut touched, &self.scorer, &self.linking);
        set.sort_hsps();
        set
    }
}

/// Deadline-bounded full local aligner.
///
/// Runs an unbanded Smith-Waterman per pair under one cumulative wall-clock
/// budget for the batch. Once the deadline passes, every remaining pair is
/// recorded as timed out (an Info diagnostic, not an error) and skipped; a
/// pair interrupted mid-table discards its partial state.
pub struct InstancedAligner {
    threshold: i32,
    timeout: Duration,
    scorer: ScoreBuilder,
    linking: LinkingParams,
}

impl InstancedAligner {
    pub fn new(threshold: i32, timeout: Duration, config: ScoringConfig) -> Self {
        let linking =
            LinkingParams::default().with_gap_costs(config.gap_open(), config.gap_extend());
        Self {
            threshold,
            timeout,
            scorer: ScoreBuilder::new(config),
            linking,
        }
    }
}

impl AlignmentEngine for InstancedAligner {
    fn generate_alignments(
        &self,
        scope: &dyn SequenceSource,
        queries: &[SeqRegion],
        subjects: &[SeqRegion],
        prior: AlignmentSet,
        diags: &mut DiagnosticList,
    ) -> AlignmentSet {
        if queries.is_empty() || subjects.is_empty() {
            return prior;
        }

        let deadline = Instant::now() + self.timeout;

        let qseqs = fetch_regions(scope, queries, "query", diags);
        if qseqs.iter().all(Option::is_none) {
            diags.push(Diagnostic::new(
                Severity::Fatal,
                DiagnosticCode::AllQueriesInvalid,
                "every query in the batch failed setup",
            ));
            return prior;
        }
        let sseqs = fetch_regions(scope, subjects, "subject", diags);

        let mut set = prior;
        let mut touched: Vec<(String, String)> = Vec::new();
        let cfg = self.scorer.config();

        for qi in 0..queries.len() {
            for si in 0..subjects.len() {
                let (Some(qseq), Some(sseq)) = (qseqs[qi].as_deref(), sseqs[si].as_deref())
                else {
                    continue;
                };
                if set.has_hsps(&queries[qi].id, &subjects[si].id) {
                    continue;
                }
                if Instant::now() >= deadline {
                    diags.push(Diagnostic::new(
                        Severity::Info,
                        DiagnosticCode::Timeout,
                        format!(
                            "pair {}/{} skipped: wall-clock budget exhausted",
                            queries[qi].id, subjects[si].id
                        ),
                    ));
                    continue;
                }

                match local_align(
                    qseq,
                    sseq,
                    &cfg.matrix,
                    cfg.gap_open(),
                    cfg.gap_extend(),
                    Some(deadline),
                ) {
                    LocalResult::TimedOut => {
                        diags.push(Diagnostic::new(
                            Severity::Info,
                            DiagnosticCode::Timeout,
                            format!(
                                "pair {}/{} timed out mid-alignment",
                                queries[qi].id, subjects[si].id
                            ),
                        ));
                    }
                    LocalResult::Done(Some(out)) if out.score > self.threshold => {
                        match build_hsp(
                            &self.scorer,
                            out,
                            queries[qi].strand.frame(),
                            subjects[si].strand.frame(),
                            query_context(qi, queries[qi].strand),
                        ) {
                            Ok(hsp) => {
                                set.push_hsp(&queries[qi].id, &subjects[si].id, hsp);
                                touched
                                    .push((queries[qi].id.clone(), subjects[si].id.clone()));
                            }
                            Err(d) => {
                                let fatal = d.is_fatal();
                                diags.push(d);
                                if fatal {
                                    return set;
                                }
                            }
                        }
                    }
                    LocalResult::Done(_) => {}
                }
            }
        }

        link_touched_pairs(&mut set, &mut touched, &self.scorer, &self.linking);
        set.sort_hsps();
        set
    }
}

/// The known aligner strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignerKind {
    Banded,
    Instanced,
}

impl std::str::FromStr for AlignerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "banded" => Ok(AlignerKind::Banded),
            "instanced" => Ok(AlignerKind::Instanced),
            other => Err(format!("unknown aligner kind: {other}")),
        }
    }
}

/// Construction knobs shared by the factory's strategies.
#[derive(Debug, Clone)]
pub struct DriverParams {
    pub threshold: i32,
    pub band_width: usize,
    pub timeout: Duration,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self {
            threshold: 0,
            band_width: 64,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Registry constructor for aligner strategies; new variants slot in here.
pub struct AlignerFactory;

impl AlignerFactory {
    pub fn create(
        kind: AlignerKind,
        config: ScoringConfig,
        params: &DriverParams,
    ) -> Box<dyn AlignmentEngine> {
        match kind {
            AlignerKind::Banded => Box::new(SimpleBandedAligner::new(
                params.threshold,
                params.band_width,
                config,
            )),
            AlignerKind::Instanced => Box::new(InstancedAligner::new(
                params.threshold,
                params.timeout,
                config,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SubstMatrix;
    use crate::sequence::MemorySequenceSource;
    use crate::stats::{KarlinParams, SearchSpace};

    fn config(with_space: bool) -> ScoringConfig {
        let mut cfg = ScoringConfig::new(
            SubstMatrix::Simple {
                reward: 1,
                penalty: -1,
            },
            KarlinParams::nucleotide_ungapped(),
        );
        cfg.set_gap_open(2);
        cfg.set_gap_extend(1);
        if with_space {
            cfg.set_effective_search_space(SearchSpace::simple(1000, 1000));
        }
        cfg
    }

    fn scope() -> MemorySequenceSource {
        let mut src = MemorySequenceSource::new();
        src.insert("q1", b"ACGTACGTACGTACGTACGT".to_vec());
        src.insert("s1", b"ACGTACGTACGTACGTACGT".to_vec());
        src.insert("s2", b"ACGTACGTACGTACGTACGA".to_vec());
        src
    }

    fn fwd(id: &str) -> SeqRegion {
        SeqRegion::new(id, Strand::Forward)
    }

    #[test]
    fn test_banded_identical_pair() {
        let aligner = SimpleBandedAligner::new(5, 10, config(true));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert_eq!(set.total_hsps(), 1);
        assert!(diags.is_empty());
        let hsp = &set.pair("q1", "s1").unwrap().hsps[0];
        assert_eq!(hsp.score, 20);
        assert_eq!(hsp.num_ident, 20);
        assert!(hsp.evalue < 1e-3);
    }

    #[test]
    fn test_threshold_gates_results() {
        let mut diags = DiagnosticList::new();
        let high = SimpleBandedAligner::new(25, 10, config(true));
        let set = high.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1")],
            AlignmentSet::new(),
            &mut diags,
        );
        // below threshold is a normal no-result outcome
        assert!(set.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_empty_subject_set() {
        let aligner = SimpleBandedAligner::new(0, 10, config(true));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[],
            AlignmentSet::new(),
            &mut diags,
        );
        assert!(set.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_fetch_failure_is_per_pair() {
        let aligner = SimpleBandedAligner::new(5, 10, config(true));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("missing"), fwd("s1")],
            AlignmentSet::new(),
            &mut diags,
        );
        // the bad subject is diagnosed, the good one still aligns
        assert_eq!(set.total_hsps(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().code, DiagnosticCode::FetchFailed);
    }

    #[test]
    fn test_all_queries_invalid_is_fatal() {
        let aligner = SimpleBandedAligner::new(5, 10, config(true));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("nope1"), fwd("nope2")],
            &[fwd("s1")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert!(set.is_empty());
        assert!(diags.has_fatal());
    }

    #[test]
    fn test_missing_search_space_is_fatal() {
        let aligner = SimpleBandedAligner::new(5, 10, config(false));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert!(set.is_empty());
        assert!(diags.has_fatal());
    }

    #[test]
    fn test_instanced_zero_timeout_times_out_every_pair() {
        let aligner = InstancedAligner::new(0, Duration::ZERO, config(true));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1"), fwd("s2")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert!(set.is_empty());
        assert_eq!(diags.len(), 2);
        for d in diags.iter() {
            assert_eq!(d.code, DiagnosticCode::Timeout);
            assert_eq!(d.severity, Severity::Info);
        }
    }

    #[test]
    fn test_instanced_finds_local_hit() {
        let aligner = InstancedAligner::new(5, Duration::from_secs(60), config(true));
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert_eq!(set.total_hsps(), 1);
        assert!(diags.is_empty());
        assert_eq!(set.pair("q1", "s1").unwrap().hsps[0].score, 20);
    }

    #[test]
    fn test_staged_composition_skips_settled_pairs() {
        let mut diags = DiagnosticList::new();
        // banded stage with a threshold only the identical pair clears
        let banded = SimpleBandedAligner::new(19, 10, config(true));
        let stage1 = banded.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1"), fwd("s2")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert_eq!(stage1.total_hsps(), 1);
        assert!(stage1.has_hsps("q1", "s1"));

        // the instanced stage only works the rejected pair
        let instanced = InstancedAligner::new(5, Duration::from_secs(60), config(true));
        let stage2 = instanced.generate_alignments(
            &scope(),
            &[fwd("q1")],
            &[fwd("s1"), fwd("s2")],
            stage1,
            &mut diags,
        );
        assert!(diags.is_empty());
        assert_eq!(stage2.total_hsps(), 2);
        assert!(stage2.has_hsps("q1", "s2"));
        // the banded stage's HSP was not recomputed or duplicated
        assert_eq!(stage2.pair("q1", "s1").unwrap().hsps.len(), 1);
    }

    #[test]
    fn test_factory_constructs_both_kinds() {
        let params = DriverParams::default();
        let scope = scope();
        let mut diags = DiagnosticList::new();
        for kind in [AlignerKind::Banded, AlignerKind::Instanced] {
            let engine = AlignerFactory::create(kind, config(true), &params);
            let set = engine.generate_alignments(
                &scope,
                &[fwd("q1")],
                &[fwd("s1")],
                AlignmentSet::new(),
                &mut diags,
            );
            assert_eq!(set.total_hsps(), 1);
        }
        assert!(diags.is_empty());
    }

    #[test]
    fn test_aligner_kind_from_str() {
        assert_eq!("banded".parse::<AlignerKind>().unwrap(), AlignerKind::Banded);
        assert_eq!(
            "Instanced".parse::<AlignerKind>().unwrap(),
            AlignerKind::Instanced
        );
        assert!("wavefront".parse::<AlignerKind>().is_err());
    }
}
