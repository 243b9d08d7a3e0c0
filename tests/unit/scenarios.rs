//! End-to-end driver batches.

use std::time::Duration;

use bandlink::align::banded::{global_banded, global_full};
use bandlink::align::driver::{AlignmentEngine, InstancedAligner, SimpleBandedAligner};
use bandlink::diagnostics::{DiagnosticCode, DiagnosticList, Severity};
use bandlink::results::AlignmentSet;
use bandlink::sequence::{reverse_complement, SeqRegion, Strand};

use crate::helpers::{config_with_space, plus_minus_one, repeat_seq, scope_with};

fn fwd(id: &str) -> SeqRegion {
    SeqRegion::new(id, Strand::Forward)
}

#[test]
fn banded_reproduces_reference_dp_when_band_covers_diagonal() {
    // one substitution, no indels: the true path is the main diagonal
    let query = repeat_seq(b"ACGTTGCA", 60);
    let mut subject = query.clone();
    subject[30] = b'A';

    let matrix = plus_minus_one();
    let banded = global_banded(&query, &subject, 0, 8, &matrix, 2, 1).unwrap();
    let reference = global_full(&query, &subject, &matrix, 2, 1).unwrap();
    assert_eq!(banded.score, reference.score);
    assert_eq!(banded.score, 58); // 59 matches - 1 mismatch
}

#[test]
fn identical_hundred_residue_scenario() {
    // two identical 100-residue sequences, band width 10, threshold 50:
    // exactly one HSP, score 100 under +1/-1, e-value near zero
    let seq = repeat_seq(b"ACGT", 100);
    let scope = scope_with(&[("q", &seq), ("s", &seq)]);
    let config = config_with_space(plus_minus_one(), 100, 100);

    let aligner = SimpleBandedAligner::new(50, 10, config);
    let mut diags = DiagnosticList::new();
    let set = aligner.generate_alignments(
        &scope,
        &[fwd("q")],
        &[fwd("s")],
        AlignmentSet::new(),
        &mut diags,
    );

    assert!(diags.is_empty());
    assert_eq!(set.total_hsps(), 1);
    let hsp = &set.pair("q", "s").unwrap().hsps[0];
    assert_eq!(hsp.score, 100);
    assert_eq!(hsp.num_ident, 100);
    assert!(hsp.evalue < 1e-20, "evalue {}", hsp.evalue);
}

#[test]
fn threshold_sweep_is_monotone() {
    let seq = repeat_seq(b"ACGT", 100);
    let scope = scope_with(&[("q", &seq), ("s", &seq)]);

    // the pair scores exactly 100; it must appear exactly for thresholds
    // below that and vanish at or above it
    for threshold in [0, 50, 99, 100, 150] {
        let config = config_with_space(plus_minus_one(), 100, 100);
        let aligner = SimpleBandedAligner::new(threshold, 10, config);
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope,
            &[fwd("q")],
            &[fwd("s")],
            AlignmentSet::new(),
            &mut diags,
        );
        assert!(diags.is_empty());
        let expected = usize::from(threshold < 100);
        assert_eq!(set.total_hsps(), expected, "threshold {threshold}");
    }
}

#[test]
fn zero_timeout_times_out_every_pair_deterministically() {
    let seq = repeat_seq(b"ACGT", 40);
    let other = repeat_seq(b"GGCC", 40);
    let scope = scope_with(&[("q1", &seq), ("q2", &other), ("s1", &seq), ("s2", &other)]);

    for _ in 0..2 {
        let config = config_with_space(plus_minus_one(), 40, 80);
        let aligner = InstancedAligner::new(0, Duration::ZERO, config);
        let mut diags = DiagnosticList::new();
        let set = aligner.generate_alignments(
            &scope,
            &[fwd("q1"), fwd("q2")],
            &[fwd("s1"), fwd("s2")],
            AlignmentSet::new(),
            &mut diags,
        );

        assert!(set.is_empty());
        assert_eq!(diags.len(), 4);
        for d in diags.iter() {
            assert_eq!(d.code, DiagnosticCode::Timeout);
            assert_eq!(d.severity, Severity::Info);
        }
    }
}

#[test]
fn empty_sets_return_empty_results_and_no_diagnostics() {
    let seq = repeat_seq(b"ACGT", 40);
    let scope = scope_with(&[("q", &seq)]);

    let config = config_with_space(plus_minus_one(), 40, 40);
    let banded = SimpleBandedAligner::new(0, 16, config);
    let mut diags = DiagnosticList::new();

    let set = banded.generate_alignments(
        &scope,
        &[fwd("q")],
        &[],
        AlignmentSet::new(),
        &mut diags,
    );
    assert!(set.is_empty());
    assert!(diags.is_empty());

    let config = config_with_space(plus_minus_one(), 40, 40);
    let instanced = InstancedAligner::new(0, Duration::from_secs(5), config);
    let set = instanced.generate_alignments(
        &scope,
        &[],
        &[fwd("q")],
        AlignmentSet::new(),
        &mut diags,
    );
    assert!(set.is_empty());
    assert!(diags.is_empty());
}

#[test]
fn reverse_strand_subject_aligns_against_its_complement() {
    let seq = repeat_seq(b"AACGTTGG", 64);
    let rc = reverse_complement(&seq);
    let scope = scope_with(&[("q", &seq), ("s", &rc)]);

    // fetched on the reverse strand, the subject complements back into the
    // query's orientation
    let config = config_with_space(plus_minus_one(), 64, 64);
    let aligner = SimpleBandedAligner::new(32, 10, config);
    let mut diags = DiagnosticList::new();
    let set = aligner.generate_alignments(
        &scope,
        &[fwd("q")],
        &[SeqRegion::new("s", Strand::Reverse)],
        AlignmentSet::new(),
        &mut diags,
    );

    assert!(diags.is_empty());
    assert_eq!(set.total_hsps(), 1);
    let hsp = &set.pair("q", "s").unwrap().hsps[0];
    assert_eq!(hsp.score, 64);
    assert_eq!(hsp.subject.frame, -1);
}

#[test]
fn prior_results_filter_staged_pairs() {
    // q matches s1 exactly and s2 only weakly; the banded stage settles s1,
    // the instanced stage picks up the leftover pair
    let seq = repeat_seq(b"ACGT", 80);
    let mut weak = seq.clone();
    for i in (0..80).step_by(4) {
        weak[i] = b'T';
    }
    let scope = scope_with(&[("q", &seq), ("s1", &seq), ("s2", &weak)]);

    let config = config_with_space(plus_minus_one(), 80, 160);
    let banded = SimpleBandedAligner::new(75, 10, config);
    let mut diags = DiagnosticList::new();
    let stage1 = banded.generate_alignments(
        &scope,
        &[fwd("q")],
        &[fwd("s1"), fwd("s2")],
        AlignmentSet::new(),
        &mut diags,
    );
    assert_eq!(stage1.total_hsps(), 1);
    assert!(stage1.has_hsps("q", "s1"));

    let config = config_with_space(plus_minus_one(), 80, 160);
    let instanced = InstancedAligner::new(5, Duration::from_secs(30), config);
    let stage2 = instanced.generate_alignments(
        &scope,
        &[fwd("q")],
        &[fwd("s1"), fwd("s2")],
        stage1,
        &mut diags,
    );
    assert!(diags.is_empty());
    assert!(stage2.has_hsps("q", "s2"));
    assert_eq!(stage2.pair("q", "s1").unwrap().hsps.len(), 1);
}
