//! Sum-statistics linking against the statistics layer.

use bandlink::hsp::link::{link_hsps, LinkingParams};
use bandlink::hsp::{Hsp, LinkMethod, Seg};
use bandlink::stats::sum::{gap_decay_divisor, normalize_score, small_gap_sum_e};
use bandlink::stats::{KarlinParams, SearchSpace};

use crate::helpers::{calibrated, plus_minus_one};

fn hsp(q: (i32, i32), s: (i32, i32), score: i32) -> Hsp {
    Hsp::new(Seg::new(q.0, q.1, 1), Seg::new(s.0, s.1, 1), score, 0)
}

fn params() -> LinkingParams {
    LinkingParams {
        trim: 0,
        ..LinkingParams::default()
    }
    .with_gap_costs(2, 1)
}

#[test]
fn linked_pair_reports_combined_evalue() {
    let karlin = calibrated(&plus_minus_one());
    let space = SearchSpace::simple(500, 500);

    let mut hsps = vec![hsp((0, 40), (0, 40), 38), hsp((50, 90), (50, 90), 36)];
    link_hsps(&mut hsps, &params(), &karlin, &space);

    assert!(hsps[0].linked_set && hsps[1].linked_set);
    assert_eq!(hsps[0].evalue, hsps[1].evalue);

    // the chain is more significant than either member alone
    let log_k = karlin.k.ln();
    let singleton = small_gap_sum_e(
        50,
        1,
        normalize_score(38, karlin.lambda, log_k),
        500,
        500,
        space.effective_space,
        gap_decay_divisor(0.5, 1),
    );
    assert!(hsps[0].evalue < singleton);
}

#[test]
fn chain_sum_matches_member_scores_minus_charges() {
    let karlin = KarlinParams::nucleotide_ungapped();
    let space = SearchSpace::simple(1000, 1000);

    // gaps of 12/12 between h1-h2 and 8/8 between h2-h3
    let mut hsps = vec![
        hsp((0, 30), (0, 30), 50),
        hsp((42, 72), (42, 72), 45),
        hsp((80, 110), (80, 110), 40),
    ];
    link_hsps(&mut hsps, &params(), &karlin, &space);

    let mi = LinkMethod::SmallGap.index();
    // charges: (2 + 12) then (2 + 8)
    let expected = 50 + 45 - 14 + 40 - 10;
    let tail = hsps
        .iter()
        .find(|h| h.hsp_link.num[mi] == 3)
        .expect("three-member chain");
    assert_eq!(tail.hsp_link.sum[mi], expected);
    assert!(tail.hsp_link.sum[mi] >= 50);
}

#[test]
fn ordering_method_records_the_winning_model() {
    let karlin = calibrated(&plus_minus_one());
    let space = SearchSpace::simple(2000, 2000);

    // close pair: SmallGap admissible and cheaper than LargeGap's flat rate
    let mut near = vec![hsp((0, 30), (0, 30), 40), hsp((35, 65), (35, 65), 38)];
    link_hsps(&mut near, &params(), &karlin, &space);
    assert_eq!(near[0].ordering_method, Some(LinkMethod::SmallGap));

    // distant pair: only LargeGap can link it, and the scores must absorb
    // its flat per-link charge
    let mut far = vec![hsp((0, 30), (0, 30), 80), hsp((600, 630), (600, 630), 78)];
    link_hsps(&mut far, &params(), &karlin, &space);
    assert_eq!(far[0].ordering_method, Some(LinkMethod::LargeGap));
}

#[test]
fn exactly_one_chain_head_per_selected_chain() {
    let karlin = calibrated(&plus_minus_one());
    let space = SearchSpace::simple(2000, 2000);

    let mut hsps: Vec<Hsp> = (0..5)
        .map(|i| {
            let base = i * 45;
            hsp((base, base + 30), (base, base + 30), 35 + i)
        })
        .collect();
    link_hsps(&mut hsps, &params(), &karlin, &space);

    let heads = hsps
        .iter()
        .filter(|h| h.linked_set && h.start_of_chain)
        .count();
    let in_chains = hsps.iter().filter(|h| h.linked_set).count();
    assert!(heads >= 1);
    assert!(in_chains > heads, "chains have members beyond their heads");
}
