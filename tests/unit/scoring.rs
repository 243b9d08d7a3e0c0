//! Score builder and Karlin-Altschul conversions.

use bandlink::align::result::EditOp;
use bandlink::score::{GappedAlignment, ScoreBuilder, ScoreKind, ScoringConfig};
use bandlink::stats::{evalue_from_raw, SearchSpace};

use crate::helpers::{calibrated, plus_minus_one};

fn aligned<'a>(query: &'a [u8], subject: &'a [u8], ops: &'a [EditOp]) -> GappedAlignment<'a> {
    GappedAlignment {
        query,
        subject,
        q_start: 0,
        s_start: 0,
        ops,
    }
}

#[test]
fn evalue_at_zero_score_equals_k_times_search_space() {
    let matrix = plus_minus_one();
    let karlin = calibrated(&matrix);
    let space = SearchSpace::simple(100, 1000);

    let e = evalue_from_raw(0, &karlin, &space);
    let expected = karlin.k * 100_000.0;
    assert!((e - expected).abs() / expected < 1e-9);
}

#[test]
fn builder_and_stats_layer_agree_on_evalue() {
    let matrix = plus_minus_one();
    let karlin = calibrated(&matrix);
    let space = SearchSpace::simple(200, 2000);

    let mut config = ScoringConfig::new(matrix, karlin);
    config.set_effective_search_space(space);
    let builder = ScoreBuilder::new(config);

    for score in [10, 40, 90] {
        let via_builder = builder.blast_evalue(score).unwrap();
        let direct = evalue_from_raw(score, &karlin, &space);
        assert!((via_builder - direct).abs() / direct < 1e-12);
    }
}

#[test]
fn compute_score_kinds_are_consistent() {
    let matrix = plus_minus_one();
    let karlin = calibrated(&matrix);

    let mut config = ScoringConfig::new(matrix, karlin);
    config.set_gap_open(2);
    config.set_gap_extend(1);
    config.set_effective_search_space(SearchSpace::simple(100, 100));
    let builder = ScoreBuilder::new(config);

    let ops = vec![
        EditOp::Match,
        EditOp::Match,
        EditOp::Match,
        EditOp::Del,
        EditOp::Match,
    ];
    let aln = aligned(b"ACGT", b"ACGAT", &ops);

    let raw = builder
        .compute_score(&aln, None, ScoreKind::Raw)
        .unwrap();
    assert_eq!(raw, 4.0 - 3.0); // four matches, one opened gap column

    let bits = builder
        .compute_score(&aln, None, ScoreKind::Bit)
        .unwrap();
    assert!((bits - builder.blast_bit_score(raw as i32)).abs() < 1e-12);

    let e = builder
        .compute_score(&aln, None, ScoreKind::EValue)
        .unwrap();
    assert!((e - builder.blast_evalue(raw as i32).unwrap()).abs() / e < 1e-12);
}

#[test]
fn traceback_rows_render_gaps() {
    let matrix = plus_minus_one();
    let karlin = calibrated(&matrix);
    let builder = ScoreBuilder::new(ScoringConfig::new(matrix, karlin));

    let ops = vec![
        EditOp::Match,
        EditOp::Ins,
        EditOp::Match,
        EditOp::Mismatch,
    ];
    let aln = aligned(b"AGCT", b"ACA", &ops);
    let (q, mid, s) = builder.traceback_strings(&aln);
    assert_eq!(q, "AGCT");
    assert_eq!(s, "A-CA");
    assert_eq!(mid, "| | ");
}
