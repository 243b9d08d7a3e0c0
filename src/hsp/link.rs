//! Sum-statistics linking of co-linear HSPs.
//!
//! Both ordering methods run over the same pair group and the best chain
//! wins. A chain is built by a forward dynamic program over HSPs sorted by
//! coordinate: each HSP picks the admissible predecessor maximizing the
//! running sum minus the method's gap charge. Extraction is greedy — the
//! highest-sum chain is marked and removed, survivors whose link pointed
//! into it are flagged `changed` and re-evaluated on the next pass — and
//! repeats until the group is empty or the pass cap is hit.
//!
//! Gap-cost models (one per [`LinkMethod`]):
//! - `SmallGap`: predecessor admissible when both trimmed coordinate gaps
//!   fall in `(0, max_gap]` and the diagonal drift `|qgap - sgap|` does not
//!   exceed `max_gap`; charge `gap_open + gap_extend * max(qgap, sgap)`.
//! - `LargeGap`: any positive trimmed gaps, flat charge
//!   `gap_open + gap_extend * max_gap` per link, chains capped at
//!   `max_links` members.
//!
//! A link is only taken when the predecessor's net contribution is positive,
//! so every formed chain outscores each of its members. Ties between chains
//! prefer fewer links, then the lower subject start of the chain head, then
//! `SmallGap` over `LargeGap`.

use crate::stats::sum::{
    gap_decay_divisor, large_gap_sum_e, normalize_score, small_gap_sum_e, GAP_DECAY_RATE,
    GAP_SIZE, OVERLAP_SIZE, TRIM_SIZE,
};
use crate::stats::{KarlinParams, SearchSpace};

use super::{Hsp, LinkMethod};

/// Knobs for the linking pass. Gap charges default to zero until configured,
/// mirroring the score builder's treatment of unset gap costs.
#[derive(Debug, Clone, Copy)]
pub struct LinkingParams {
    pub gap_open: i32,
    pub gap_extend: i32,
    /// SmallGap admissibility bound and the LargeGap flat-charge scale
    pub max_gap: i32,
    /// LargeGap chain-length cap
    pub max_links: i32,
    /// End trim applied before admissibility tests
    pub trim: i32,
    pub gap_decay_rate: f64,
    /// Relaxation pass cap; survivors get singleton e-values when hit
    pub max_passes: usize,
}

impl Default for LinkingParams {
    fn default() -> Self {
        Self {
            gap_open: 0,
            gap_extend: 0,
            max_gap: GAP_SIZE,
            max_links: 16,
            trim: TRIM_SIZE,
            gap_decay_rate: GAP_DECAY_RATE,
            max_passes: 64,
        }
    }
}

impl LinkingParams {
    pub fn with_gap_costs(mut self, gap_open: i32, gap_extend: i32) -> Self {
        self.gap_open = gap_open;
        self.gap_extend = gap_extend;
        self
    }
}

/// Trimmed coordinate gaps from `p` to `h`; `None` unless both are positive
/// (strictly co-linear, non-overlapping after trimming).
#[inline]
fn trimmed_gaps(p: &Hsp, h: &Hsp) -> Option<(i32, i32)> {
    let qgap = h.query.offset_trim - p.query.end_trim;
    let sgap = h.subject.offset_trim - p.subject.end_trim;
    if qgap > 0 && sgap > 0 {
        Some((qgap, sgap))
    } else {
        None
    }
}

/// Link the HSPs of one query/subject pair group in place.
///
/// Sets `linked_set`, `start_of_chain`, `ordering_method`, the chain fields
/// of `hsp_link`, and each member's `evalue` (the whole chain reports its
/// combined sum e-value). Single-HSP groups are left untouched. The sort
/// order is deterministic, so repeated runs over the same input produce
/// identical chains.
pub fn link_hsps(
    hsps: &mut [Hsp],
    params: &LinkingParams,
    karlin: &KarlinParams,
    space: &SearchSpace,
) {
    let n = hsps.len();
    if n < 2 {
        return;
    }

    for h in hsps.iter_mut() {
        let qt = params.trim.min(h.query.len() / 4).max(0);
        let st = params.trim.min(h.subject.len() / 4).max(0);
        h.query.offset_trim = h.query.offset + qt;
        h.query.end_trim = h.query.end - qt;
        h.subject.offset_trim = h.subject.offset + st;
        h.subject.end_trim = h.subject.end - st;
        h.hsp_link.changed = true;
        h.hsp_link.linked_to = 0;
    }

    // deterministic processing order: subject start, then query start, then
    // score (high first), then ends
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let ha = &hsps[a];
        let hb = &hsps[b];
        ha.subject
            .offset
            .cmp(&hb.subject.offset)
            .then(ha.query.offset.cmp(&hb.query.offset))
            .then(hb.score.cmp(&ha.score))
            .then(ha.subject.end.cmp(&hb.subject.end))
            .then(ha.query.end.cmp(&hb.query.end))
    });

    let log_k = karlin.k.ln();
    let xscore: Vec<f64> = hsps
        .iter()
        .map(|h| normalize_score(h.score, karlin.lambda, log_k))
        .collect();

    let eff_query_len = space.effective_query_len.max(1.0) as i32;
    let eff_subject_len = space.effective_db_len.max(1.0) as i32;
    let starting_points = params.max_gap + OVERLAP_SIZE + 1;
    let large_gap_charge = params.gap_open + params.gap_extend * params.max_gap;

    let mut active = vec![true; n];
    // subject start of the chain head reachable from each HSP, per method
    let mut head_off = vec![[0i32; 2]; n];
    // DP output moved this pass (scratch, drives downstream re-evaluation)
    let mut output_changed = vec![false; n];
    let mut remaining = n;
    let mut first_pass = true;
    let mut passes = 0usize;

    while remaining > 0 {
        passes += 1;
        if passes > params.max_passes {
            // pass cap: survivors report singleton e-values
            for &h in &order {
                if active[h] {
                    let weight = gap_decay_divisor(params.gap_decay_rate, 1);
                    hsps[h].evalue = small_gap_sum_e(
                        starting_points,
                        1,
                        xscore[h],
                        eff_query_len,
                        eff_subject_len,
                        space.effective_space,
                        weight,
                    );
                }
            }
            break;
        }

        // DP pass over the active set in coordinate order
        for (pos, &h) in order.iter().enumerate() {
            if !active[h] {
                continue;
            }

            // re-evaluate when flagged, or when a link target was removed or
            // had its own sums move this pass; otherwise the stored choice is
            // still the best one
            let mut must = first_pass || hsps[h].hsp_link.changed;
            if !must {
                for m in LinkMethod::ALL {
                    if let Some(t) = hsps[h].hsp_link.link[m.index()] {
                        let t = t as usize;
                        if !active[t] || output_changed[t] {
                            must = true;
                            break;
                        }
                    }
                }
            }
            if !must {
                output_changed[h] = false;
                continue;
            }

            let old_sum = hsps[h].hsp_link.sum;

            for m in LinkMethod::ALL {
                let mi = m.index();
                // best admissible predecessor: max net contribution, ties to
                // fewer links, then lower subject start
                let mut best: Option<(i32, i32, i32, usize)> = None;
                for &p in order.iter().take(pos) {
                    if !active[p] {
                        continue;
                    }
                    let Some((qgap, sgap)) = trimmed_gaps(&hsps[p], &hsps[h]) else {
                        continue;
                    };
                    let charge = match m {
                        LinkMethod::SmallGap => {
                            if qgap > params.max_gap
                                || sgap > params.max_gap
                                || (qgap - sgap).abs() > params.max_gap
                            {
                                continue;
                            }
                            params.gap_open + params.gap_extend * qgap.max(sgap)
                        }
                        LinkMethod::LargeGap => {
                            if hsps[p].hsp_link.num[mi] >= params.max_links {
                                continue;
                            }
                            large_gap_charge
                        }
                    };
                    let cand = hsps[p].hsp_link.sum[mi] - charge;
                    if cand <= 0 {
                        continue;
                    }
                    let key = (cand, -hsps[p].hsp_link.num[mi], -hsps[p].subject.offset);
                    let better = match best {
                        None => true,
                        Some((bc, bn, bo, _)) => key > (bc, bn, bo),
                    };
                    if better {
                        best = Some((key.0, key.1, key.2, p));
                    }
                }

                match best {
                    Some((cand, _, _, p)) => {
                        let p_num = hsps[p].hsp_link.num[mi];
                        let p_xsum = hsps[p].hsp_link.xsum[mi];
                        let p_head = head_off[p][mi];
                        hsps[h].hsp_link.sum[mi] = hsps[h].score + cand;
                        hsps[h].hsp_link.num[mi] = p_num + 1;
                        hsps[h].hsp_link.xsum[mi] = p_xsum + xscore[h];
                        hsps[h].hsp_link.link[mi] = Some(p as u32);
                        head_off[h][mi] = p_head;
                    }
                    None => {
                        hsps[h].hsp_link.sum[mi] = hsps[h].score;
                        hsps[h].hsp_link.num[mi] = 1;
                        hsps[h].hsp_link.xsum[mi] = xscore[h];
                        hsps[h].hsp_link.link[mi] = None;
                        head_off[h][mi] = hsps[h].subject.offset;
                    }
                }
            }

            output_changed[h] = first_pass || hsps[h].hsp_link.sum != old_sum;
            hsps[h].hsp_link.changed = false;
        }
        first_pass = false;

        // refresh the incoming-link counts for the active set
        for h in hsps.iter_mut() {
            h.hsp_link.linked_to = 0;
        }
        for &h in &order {
            if !active[h] {
                continue;
            }
            for m in LinkMethod::ALL {
                if let Some(t) = hsps[h].hsp_link.link[m.index()] {
                    let t = t as usize;
                    if active[t] {
                        hsps[t].hsp_link.linked_to += 1;
                    }
                }
            }
        }

        // pick the winning chain across both methods
        let mut best: Option<(usize, LinkMethod)> = None;
        for &h in &order {
            if !active[h] {
                continue;
            }
            for m in LinkMethod::ALL {
                let mi = m.index();
                let key = (
                    hsps[h].hsp_link.sum[mi],
                    -hsps[h].hsp_link.num[mi],
                    -head_off[h][mi],
                    // SmallGap preferred on full ties
                    -(mi as i32),
                );
                let better = match best {
                    None => true,
                    Some((bh, bm)) => {
                        let bmi = bm.index();
                        key > (
                            hsps[bh].hsp_link.sum[bmi],
                            -hsps[bh].hsp_link.num[bmi],
                            -head_off[bh][bmi],
                            -(bmi as i32),
                        )
                    }
                };
                if better {
                    best = Some((h, m));
                }
            }
        }

        let Some((tail, method)) = best else {
            break;
        };
        let mi = method.index();

        // walk back to the head, collecting the chain
        let mut members = vec![tail];
        let mut cur = tail;
        while let Some(p) = hsps[cur].hsp_link.link[mi] {
            cur = p as usize;
            members.push(cur);
        }
        let head = cur;
        let num = hsps[tail].hsp_link.num[mi];
        debug_assert_eq!(num as usize, members.len());

        let xsum = hsps[tail].hsp_link.xsum[mi];
        let weight = gap_decay_divisor(params.gap_decay_rate, num as usize);
        let evalue = match method {
            LinkMethod::SmallGap => small_gap_sum_e(
                starting_points,
                num,
                xsum,
                eff_query_len,
                eff_subject_len,
                space.effective_space,
                weight,
            ),
            LinkMethod::LargeGap => large_gap_sum_e(
                num,
                xsum,
                eff_query_len,
                eff_subject_len,
                space.effective_space,
                weight,
            ),
        };

        for &mem in &members {
            hsps[mem].evalue = evalue;
            if num > 1 {
                hsps[mem].linked_set = true;
                hsps[mem].ordering_method = Some(method);
            }
            active[mem] = false;
            remaining -= 1;
        }
        if num > 1 {
            hsps[head].start_of_chain = true;
        }

        // survivors pointing into the removed chain must re-evaluate
        for &h in &order {
            if !active[h] {
                continue;
            }
            for m in LinkMethod::ALL {
                if let Some(t) = hsps[h].hsp_link.link[m.index()] {
                    if !active[t as usize] {
                        hsps[h].hsp_link.changed = true;
                    }
                }
            }
        }
    }
}
