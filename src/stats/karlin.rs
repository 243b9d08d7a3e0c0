//! Raw score to bit score and e-value conversions.

use crate::math::LN2;

use super::search_space::SearchSpace;

/// Karlin-Altschul statistical parameters for one scoring system.
#[derive(Debug, Clone, Copy)]
pub struct KarlinParams {
    /// Scale parameter for converting raw scores to nats
    pub lambda: f64,
    /// Search-space proportionality constant
    pub k: f64,
    /// Relative entropy of the scoring system
    pub h: f64,
    /// Length-correction slope
    pub alpha: f64,
    /// Length-correction intercept
    pub beta: f64,
}

impl KarlinParams {
    /// Ungapped nucleotide defaults for +1/-2 scoring.
    pub fn nucleotide_ungapped() -> Self {
        Self {
            lambda: 1.33,
            k: 0.621,
            h: 1.12,
            alpha: 1.12,
            beta: 0.0,
        }
    }

    /// Ungapped BLOSUM62 ideal parameters.
    pub fn blosum62_ungapped() -> Self {
        Self {
            lambda: 0.3176,
            k: 0.134,
            h: 0.4012,
            alpha: 0.7916,
            beta: -3.2,
        }
    }
}

/// Bit score: `S' = (lambda * S - ln K) / ln 2`.
pub fn bit_score(raw_score: i32, params: &KarlinParams) -> f64 {
    (params.lambda * (raw_score as f64) - params.k.ln()) / LN2
}

/// E-value from a bit score: `E = space * 2^(-S')`.
pub fn evalue_from_bit_score(bits: f64, search_space: &SearchSpace) -> f64 {
    search_space.effective_space * 2.0_f64.powf(-bits)
}

/// E-value straight from the raw score: `E = K * space * exp(-lambda * S)`.
pub fn evalue_from_raw(raw_score: i32, params: &KarlinParams, search_space: &SearchSpace) -> f64 {
    params.k * search_space.effective_space * (-params.lambda * (raw_score as f64)).exp()
}

/// Smallest raw score whose e-value is at or below `e_value` (inverse of
/// [`evalue_from_raw`]).
pub fn raw_score_for_evalue(
    e_value: f64,
    params: &KarlinParams,
    search_space: &SearchSpace,
) -> i32 {
    if e_value <= 0.0 {
        return i32::MAX;
    }
    let score =
        (params.k.ln() + search_space.effective_space.ln() - e_value.ln()) / params.lambda;
    score.ceil() as i32
}
