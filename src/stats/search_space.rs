//! Effective search space.
//!
//! E-values are normalized by the product of the query and database lengths.
//! Because an optimal local alignment cannot start near a sequence boundary,
//! both lengths are shrunk by a length adjustment before the product is
//! taken; the adjustment itself depends on the search space, so it is solved
//! as a fixed point.

use super::karlin::KarlinParams;

/// Effective search space with length-adjusted dimensions.
#[derive(Debug, Clone, Copy)]
pub struct SearchSpace {
    /// Effective query length after adjustment
    pub effective_query_len: f64,
    /// Effective database length after adjustment
    pub effective_db_len: f64,
    /// Product of the effective lengths
    pub effective_space: f64,
    /// The length adjustment that was applied
    pub length_adjustment: i64,
}

impl SearchSpace {
    /// Plain product of the raw lengths, no adjustment.
    pub fn simple(query_len: usize, db_len: usize) -> Self {
        let q = query_len as f64;
        let d = db_len as f64;
        Self {
            effective_query_len: q,
            effective_db_len: d,
            effective_space: q * d,
            length_adjustment: 0,
        }
    }

    /// An explicitly supplied effective space (e.g. carried over from a
    /// larger database search).
    pub fn explicit(effective_space: f64) -> Self {
        Self {
            effective_query_len: effective_space.sqrt(),
            effective_db_len: effective_space.sqrt(),
            effective_space,
            length_adjustment: 0,
        }
    }

    /// Length-adjusted search space for a single query/subject comparison.
    ///
    /// Solves the fixed point
    /// `ell = alpha/lambda * (ln K + ln((m - ell)(n - ell))) + beta`
    /// by damped iteration; `ell` is clamped so both effective lengths stay
    /// positive.
    pub fn with_length_adjustment(query_len: usize, db_len: usize, params: &KarlinParams) -> Self {
        let m = query_len as f64;
        let n = db_len as f64;

        let ell = compute_length_adjustment(m, n, params);

        let effective_m = (m - ell).max(1.0);
        let effective_n = (n - ell).max(1.0);

        Self {
            effective_query_len: effective_m,
            effective_db_len: effective_n,
            effective_space: effective_m * effective_n,
            length_adjustment: ell as i64,
        }
    }
}

fn compute_length_adjustment(m: f64, n: f64, params: &KarlinParams) -> f64 {
    if params.lambda <= 0.0 || params.k <= 0.0 {
        return 0.0;
    }
    let slope = params.alpha / params.lambda;
    let log_k = params.k.ln();

    // ell may not eat more than half of the shorter sequence
    let ell_max = (m.min(n) / 2.0).floor();

    let mut ell = 0.0_f64;
    for _ in 0..20 {
        let em = (m - ell).max(1.0);
        let en = (n - ell).max(1.0);
        let next = (slope * (log_k + (em * en).ln()) + params.beta).max(0.0);
        let next = next.min(ell_max);
        if (next - ell).abs() < 0.5 {
            ell = next;
            break;
        }
        ell = next;
    }
    ell.floor()
}
