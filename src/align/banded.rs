//! Dynamic-programming alignment kernels.
//!
//! [`global_banded`] is the workhorse: a global alignment confined to a
//! diagonal band, bounding work and memory to `O(len * band)` instead of the
//! full `O(len^2)` table. [`global_full`] widens the band to cover the whole
//! table and serves as the reference implementation. [`local_align`] is the
//! unbanded Smith-Waterman kernel used by the deadline-bounded driver.
//!
//! Gap costs are affine and positive: a run of length L costs
//! `gap_open + gap_extend * L`.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::matrix::SubstMatrix;

use super::result::{AlignOutcome, EditOp};
use super::traceback::{TracebackDir, TracebackMatrix};

const NEG_INF: i32 = i32::MIN / 4;

// direction codes for the banded table
const DIR_DIAG: u8 = 0;
const DIR_UP: u8 = 1;
const DIR_LEFT: u8 = 2;
const DIR_START: u8 = 3;

/// Banded global alignment of `query` against `subject` around `diag`
/// (subject offset minus query offset), half-width `half`.
///
/// Returns `None` when the band cannot contain both corners of the DP table
/// — such a band admits no global path at all, which the drivers treat as a
/// normal no-result outcome.
pub fn global_banded(
    query: &[u8],
    subject: &[u8],
    diag: i64,
    half: usize,
    matrix: &SubstMatrix,
    gap_open: i32,
    gap_extend: i32,
) -> Option<AlignOutcome> {
    let n = query.len();
    let m = subject.len();

    // degenerate shapes are pure gap runs
    if n == 0 || m == 0 {
        let mut ops = Vec::new();
        let mut score = 0;
        if n > 0 {
            ops.extend(std::iter::repeat(EditOp::Ins).take(n));
            score -= gap_open + gap_extend * n as i32;
        }
        if m > 0 {
            ops.extend(std::iter::repeat(EditOp::Del).take(m));
            score -= gap_open + gap_extend * m as i32;
        }
        return Some(AlignOutcome {
            score,
            q_start: 0,
            q_end: n,
            s_start: 0,
            s_end: m,
            ops,
        });
    }

    let half_i = half as i64;
    if diag.abs() > half_i {
        return None;
    }
    if (m as i64 - n as i64 - diag).abs() > half_i {
        return None;
    }

    let band = 2 * half + 1;
    // band column of table cell (i, j)
    let k_of = |i: usize, j: usize| -> i64 { j as i64 - (i as i64 + diag) + half_i };

    let mut h_prev = vec![NEG_INF; band];
    let mut h_curr = vec![NEG_INF; band];
    let mut e_prev = vec![NEG_INF; band];
    let mut e_curr = vec![NEG_INF; band];
    let mut dirs = vec![DIR_START; (n + 1) * band];

    // row 0: leading gap in query
    {
        let j_lo = (diag - half_i).max(0);
        let j_hi = (diag + half_i).min(m as i64);
        for j in j_lo..=j_hi {
            let k = k_of(0, j as usize) as usize;
            if j == 0 {
                h_curr[k] = 0;
            } else {
                h_curr[k] = -(gap_open + gap_extend * j as i32);
                dirs[k] = DIR_LEFT;
            }
        }
    }
    std::mem::swap(&mut h_prev, &mut h_curr);
    std::mem::swap(&mut e_prev, &mut e_curr);

    for i in 1..=n {
        h_curr.fill(NEG_INF);
        e_curr.fill(NEG_INF);

        let j_lo = (i as i64 + diag - half_i).max(0);
        let j_hi = (i as i64 + diag + half_i).min(m as i64);
        if j_lo > j_hi {
            return None;
        }

        // F state (gap in query) runs along the row
        let mut f = NEG_INF;

        for jj in j_lo..=j_hi {
            let j = jj as usize;
            let k = (jj - (i as i64 + diag) + half_i) as usize;

            if j == 0 {
                // leading gap in subject
                h_curr[k] = -(gap_open + gap_extend * i as i32);
                e_curr[k] = h_curr[k];
                dirs[i * band + k] = DIR_UP;
                continue;
            }

            // (i-1, j-1) maps to the same band column; (i-1, j) to k+1
            let diag_score = h_prev[k].saturating_add(matrix.score(query[i - 1], subject[j - 1]));
            let (up_h, up_e) = if k + 1 < band {
                (h_prev[k + 1], e_prev[k + 1])
            } else {
                (NEG_INF, NEG_INF)
            };
            let e_val = (up_h - gap_open - gap_extend).max(up_e - gap_extend);
            e_curr[k] = e_val;

            let left_h = if k > 0 { h_curr[k - 1] } else { NEG_INF };
            let f_val = (left_h - gap_open - gap_extend).max(f - gap_extend);

            let mut best = diag_score;
            let mut dir = DIR_DIAG;
            if e_val > best {
                best = e_val;
                dir = DIR_UP;
            }
            if f_val > best {
                best = f_val;
                dir = DIR_LEFT;
            }
            h_curr[k] = best;
            dirs[i * band + k] = dir;
            f = f_val;
        }

        std::mem::swap(&mut h_prev, &mut h_curr);
        std::mem::swap(&mut e_prev, &mut e_curr);
    }

    let k_end = k_of(n, m) as usize;
    let score = h_prev[k_end];
    if score < NEG_INF / 2 {
        return None;
    }

    // walk the stored directions back from (n, m)
    let mut ops = Vec::new();
    let mut i = n;
    let mut j = m;
    while i > 0 || j > 0 {
        let k = k_of(i, j);
        if k < 0 || k >= band as i64 {
            return None;
        }
        match dirs[i * band + k as usize] {
            DIR_DIAG => {
                ops.push(if query[i - 1] == subject[j - 1] {
                    EditOp::Match
                } else {
                    EditOp::Mismatch
                });
                i -= 1;
                j -= 1;
            }
            DIR_UP => {
                ops.push(EditOp::Ins);
                i -= 1;
            }
            DIR_LEFT => {
                ops.push(EditOp::Del);
                j -= 1;
            }
            _ => break,
        }
    }
    ops.reverse();

    Some(AlignOutcome {
        score,
        q_start: 0,
        q_end: n,
        s_start: 0,
        s_end: m,
        ops,
    })
}

/// Unbanded global alignment: the reference the banded kernel is checked
/// against.
pub fn global_full(
    query: &[u8],
    subject: &[u8],
    matrix: &SubstMatrix,
    gap_open: i32,
    gap_extend: i32,
) -> Option<AlignOutcome> {
    let half = query.len().max(subject.len());
    global_banded(query, subject, 0, half, matrix, gap_open, gap_extend)
}

/// Outcome of a deadline-bounded local alignment.
#[derive(Debug)]
pub enum LocalResult {
    /// Finished; `None` when no positive-scoring local alignment exists
    Done(Option<AlignOutcome>),
    /// The wall-clock deadline expired; partial state is discarded
    TimedOut,
}

/// Full Smith-Waterman local alignment with traceback.
///
/// The deadline is checked before each row; on expiry the partial table is
/// dropped and `TimedOut` returned, so a zero-second budget times out before
/// any cell is filled.
pub fn local_align(
    query: &[u8],
    subject: &[u8],
    matrix: &SubstMatrix,
    gap_open: i32,
    gap_extend: i32,
    deadline: Option<Instant>,
) -> LocalResult {
    let expired = |d: &Option<Instant>| d.map(|d| Instant::now() >= d).unwrap_or(false);
    if expired(&deadline) {
        return LocalResult::TimedOut;
    }

    let n = query.len();
    let m = subject.len();
    if n == 0 || m == 0 {
        return LocalResult::Done(None);
    }

    let mut h_prev = vec![0i32; m + 1];
    let mut h_curr = vec![0i32; m + 1];
    let mut e_row = vec![NEG_INF; m + 1];
    let mut tb = TracebackMatrix::new(n + 1, m + 1);

    let mut best = 0i32;
    let mut best_i = 0usize;
    let mut best_j = 0usize;

    for i in 1..=n {
        if expired(&deadline) {
            return LocalResult::TimedOut;
        }
        let mut f = NEG_INF;
        h_curr[0] = 0;
        for j in 1..=m {
            e_row[j] = (h_prev[j] - gap_open - gap_extend).max(e_row[j] - gap_extend);
            f = (h_curr[j - 1] - gap_open - gap_extend).max(f - gap_extend);
            let diag = h_prev[j - 1] + matrix.score(query[i - 1], subject[j - 1]);

            let mut score = diag;
            let mut dir = TracebackDir::Diag;
            if e_row[j] > score {
                score = e_row[j];
                dir = TracebackDir::Up;
            }
            if f > score {
                score = f;
                dir = TracebackDir::Left;
            }
            if score <= 0 {
                score = 0;
                dir = TracebackDir::Stop;
            }
            h_curr[j] = score;
            tb.set(i, j, dir);
            if score > best {
                best = score;
                best_i = i;
                best_j = j;
            }
        }
        std::mem::swap(&mut h_prev, &mut h_curr);
    }

    if best <= 0 {
        return LocalResult::Done(None);
    }

    let mut ops = Vec::new();
    let mut i = best_i;
    let mut j = best_j;
    loop {
        match tb.get(i, j) {
            TracebackDir::Diag => {
                ops.push(if query[i - 1] == subject[j - 1] {
                    EditOp::Match
                } else {
                    EditOp::Mismatch
                });
                i -= 1;
                j -= 1;
            }
            TracebackDir::Up => {
                ops.push(EditOp::Ins);
                i -= 1;
            }
            TracebackDir::Left => {
                ops.push(EditOp::Del);
                j -= 1;
            }
            TracebackDir::Stop => break,
        }
    }
    ops.reverse();

    LocalResult::Done(Some(AlignOutcome {
        score: best,
        q_start: i,
        q_end: best_i,
        s_start: j,
        s_end: best_j,
        ops,
    }))
}

/// Most-voted seed diagonal (subject offset minus query offset) over shared
/// words of length `word`. Ties go to the diagonal closest to zero, then the
/// numerically smaller one; no shared word at all votes for the main
/// diagonal.
pub fn best_diagonal(query: &[u8], subject: &[u8], word: usize) -> i64 {
    let w = word.max(1);
    if query.len() < w || subject.len() < w {
        return 0;
    }

    let mut index: FxHashMap<&[u8], Vec<usize>> = FxHashMap::default();
    for i in 0..=(query.len() - w) {
        index.entry(&query[i..i + w]).or_default().push(i);
    }

    let mut votes: FxHashMap<i64, u32> = FxHashMap::default();
    for j in 0..=(subject.len() - w) {
        if let Some(starts) = index.get(&subject[j..j + w]) {
            for &i in starts {
                *votes.entry(j as i64 - i as i64).or_insert(0) += 1;
            }
        }
    }

    let mut tallied: Vec<(i64, u32)> = votes.into_iter().collect();
    tallied.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(a.0.abs().cmp(&b.0.abs()))
            .then(a.0.cmp(&b.0))
    });
    tallied.first().map(|&(d, _)| d).unwrap_or(0)
}
