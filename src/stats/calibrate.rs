//! Karlin-Altschul parameter search.
//!
//! Lambda is the unique positive root of `sum_s p(s) exp(lambda s) = 1`,
//! found by safeguarded Newton iteration over the substituted variable
//! `x = exp(-lambda)` with a bisection bracket; H follows from lambda, and K
//! from both via the alignment-score convolution sum. All three start from a
//! score frequency profile: the probability of each substitution score under
//! background residue frequencies.
//!
//! A scoring system is only calibratable when its expected score is negative
//! and both negative and positive scores occur; everything else is an error
//! the caller reports as a statistical-parameter diagnostic.

use crate::math::{expm1, gcd, powi};
use crate::matrix::SubstMatrix;

use super::karlin::KarlinParams;

const LAMBDA_ACCURACY: f64 = 1.0e-5;
const LAMBDA0: f64 = 0.5;
const LAMBDA_ITMAX: i32 = 20;
const LAMBDA_MAX_NEWTON: i32 = 37;
const K_SUMLIMIT: f64 = 0.0001;
const K_ITER_MAX: i32 = 100;

/// Probability distribution of substitution scores.
#[derive(Debug, Clone)]
pub struct ScoreFreqProfile {
    sprob: Vec<f64>,
    score_min: i32,
    obs_min: i32,
    obs_max: i32,
    score_avg: f64,
}

impl ScoreFreqProfile {
    pub fn prob(&self, score: i32) -> f64 {
        let idx = score - self.score_min;
        if idx >= 0 && (idx as usize) < self.sprob.len() {
            self.sprob[idx as usize]
        } else {
            0.0
        }
    }

    pub fn obs_min(&self) -> i32 {
        self.obs_min
    }

    pub fn obs_max(&self) -> i32 {
        self.obs_max
    }

    pub fn score_avg(&self) -> f64 {
        self.score_avg
    }
}

/// Score frequency profile of `matrix` under explicit residue frequencies.
///
/// `P(s) = sum over residue pairs (i, j) with score(i,j) = s of f_i * f_j`.
pub fn profile_from_frequencies(
    matrix: &SubstMatrix,
    alphabet: &[u8],
    freqs: &[f64],
) -> ScoreFreqProfile {
    debug_assert_eq!(alphabet.len(), freqs.len());

    let mut smin = i32::MAX;
    let mut smax = i32::MIN;
    for &a in alphabet {
        for &b in alphabet {
            let s = matrix.score(a, b);
            smin = smin.min(s);
            smax = smax.max(s);
        }
    }

    let range = (smax - smin + 1).max(1) as usize;
    let mut sprob = vec![0.0; range];
    for (i, &a) in alphabet.iter().enumerate() {
        for (j, &b) in alphabet.iter().enumerate() {
            let s = matrix.score(a, b);
            sprob[(s - smin) as usize] += freqs[i] * freqs[j];
        }
    }

    // normalize and locate the observed support
    let total: f64 = sprob.iter().sum();
    let mut obs_min = smin;
    let mut obs_max = smin;
    let mut seen_min = false;
    let mut score_avg = 0.0;
    for (idx, p) in sprob.iter_mut().enumerate() {
        if total > 0.0 {
            *p /= total;
        }
        if *p > 0.0 {
            let s = smin + idx as i32;
            if !seen_min {
                obs_min = s;
                seen_min = true;
            }
            obs_max = s;
            score_avg += (s as f64) * *p;
        }
    }

    ScoreFreqProfile {
        sprob,
        score_min: smin,
        obs_min,
        obs_max,
        score_avg,
    }
}

/// Profile of `matrix` under its own background frequencies.
pub fn standard_profile(matrix: &SubstMatrix) -> ScoreFreqProfile {
    let (alphabet, freqs) = matrix.background();
    profile_from_frequencies(matrix, &alphabet, &freqs)
}

fn check_score_range(low: i32, high: i32) -> Result<(), String> {
    if low >= 0 {
        return Err("scoring system has no negative scores".to_string());
    }
    if high <= 0 {
        return Err("scoring system has no positive scores".to_string());
    }
    if low < i16::MIN as i32 || high > i16::MAX as i32 {
        return Err("score range too wide".to_string());
    }
    Ok(())
}

/// Safeguarded Newton/bisection solve for lambda on the score lattice with
/// spacing `d` (the GCD of all observed scores).
///
/// Works in `x = exp(-lambda * d)`: the root polynomial
/// `sum_s p(s) x^(-s/d) - 1` is evaluated with Horner's rule together with
/// its derivative; Newton steps are taken only while they stay inside the
/// shrinking bisection bracket `(a, b)` and keep making progress.
fn karlin_lambda_nr(
    sfp: &ScoreFreqProfile,
    d: i32,
    low: i32,
    high: i32,
    lambda0: f64,
    tolx: f64,
    itmax: i32,
    max_newton: i32,
) -> Result<f64, String> {
    if d <= 0 {
        return Err("score lattice spacing must be positive".to_string());
    }

    let x0 = (-lambda0).exp();
    let mut x = if x0 > 0.0 && x0 < 1.0 { x0 } else { 0.5 };
    let mut a = 0.0;
    let mut b = 1.0;
    let mut f = 4.0;
    let mut is_newton = false;

    let mut k = 0;
    while k < itmax {
        let mut g = 0.0;
        let fold = f;
        let was_newton = is_newton;
        is_newton = false;

        // Horner evaluation of the polynomial and its derivative
        f = sfp.prob(low);
        let mut i = low + d;
        while i < 0 {
            g = x * g + f;
            f = f * x + sfp.prob(i);
            i += d;
        }
        g = x * g + f;
        f = f * x + sfp.prob(0) - 1.0;
        i = d;
        while i <= high {
            g = x * g + f;
            f = f * x + sfp.prob(i);
            i += d;
        }

        if f > 0.0 {
            a = x;
        } else if f < 0.0 {
            b = x;
        } else {
            break;
        }
        if b - a < 2.0 * a * (1.0 - b) * tolx {
            x = (a + b) / 2.0;
            break;
        }

        if k >= max_newton || (was_newton && f.abs() > 0.9 * fold.abs()) || g >= 0.0 {
            x = (a + b) / 2.0;
        } else {
            let p = -f / g;
            let y = x + p;
            if y <= a || y >= b {
                x = (a + b) / 2.0;
            } else {
                is_newton = true;
                x = y;
                if p.abs() < tolx * x * (1.0 - x) {
                    break;
                }
            }
        }

        k += 1;
    }

    Ok(-x.ln() / d as f64)
}

fn lambda_from_profile(sfp: &ScoreFreqProfile) -> Result<f64, String> {
    let low = sfp.obs_min();
    let high = sfp.obs_max();

    if sfp.score_avg() >= 0.0 {
        return Err("expected score must be negative".to_string());
    }
    check_score_range(low, high)?;

    // lattice spacing: GCD of all scores with non-zero probability
    let mut d = -low;
    for i in 1..=(high - low) {
        if d <= 1 {
            break;
        }
        if sfp.prob(low + i) != 0.0 {
            d = gcd(d, i);
        }
    }

    karlin_lambda_nr(
        sfp,
        d,
        low,
        high,
        LAMBDA0,
        LAMBDA_ACCURACY,
        LAMBDA_ITMAX,
        LAMBDA_MAX_NEWTON,
    )
}

/// Relative entropy H of the scoring system at the given lambda.
fn h_from_lambda(sfp: &ScoreFreqProfile, lambda: f64) -> Result<f64, String> {
    if lambda < 0.0 {
        return Err("lambda must be non-negative".to_string());
    }
    let low = sfp.obs_min();
    let high = sfp.obs_max();
    check_score_range(low, high)?;

    let etonlam = (-lambda).exp();

    let mut sum = (low as f64) * sfp.prob(low);
    for score in (low + 1)..=high {
        sum = (score as f64) * sfp.prob(score) + etonlam * sum;
    }

    let scale = powi(etonlam, high);
    let h = if scale > 0.0 {
        lambda * sum / scale
    } else {
        // underflow: redo in log space
        lambda * (lambda * high as f64 + sum.ln()).exp()
    };
    Ok(h)
}

/// K from lambda and H via the convolution of alignment-score distributions.
fn k_from_lambda_h(sfp: &ScoreFreqProfile, lambda: f64, h: f64) -> Result<f64, String> {
    if lambda <= 0.0 || h <= 0.0 {
        return Err("lambda and H must be positive".to_string());
    }
    if sfp.score_avg() >= 0.0 {
        return Err("expected score must be negative".to_string());
    }

    let mut low = sfp.obs_min();
    let mut high = sfp.obs_max();
    check_score_range(low, high)?;

    let mut range = high - low;
    let mut probs = Vec::with_capacity((range + 1) as usize);
    for i in 0..=range {
        probs.push(sfp.prob(low + i));
    }

    let mut divisor = -low;
    for i in 1..=range {
        if divisor <= 1 {
            break;
        }
        if probs[i as usize] != 0.0 {
            divisor = gcd(divisor, i);
        }
    }

    let orig_low = low;
    let orig_high = high;
    high /= divisor;
    low /= divisor;
    let lambda = lambda * divisor as f64;
    range = high - low;

    let mut first_term = h / lambda;
    let exp_minus_lambda = (-lambda).exp();

    if low == -1 && high == 1 {
        // two-point distribution has a closed form
        let low_prob = sfp.prob(orig_low);
        let high_prob = sfp.prob(orig_high);
        let diff = low_prob - high_prob;
        return Ok(diff * diff / low_prob);
    }

    if low == -1 || high == 1 {
        if high != 1 {
            let score_avg = sfp.score_avg() / divisor as f64;
            first_term = (score_avg * score_avg) / first_term;
        }
        return Ok(first_term * (1.0 - exp_minus_lambda));
    }

    // general case: accumulate the outer sum over alignment lengths until
    // the inner (per-length) contribution drops below the cutoff
    let array_len = (K_ITER_MAX as usize) * (range as usize) + 1;
    let mut score_probs = vec![0.0; array_len];
    let mut outer_sum = 0.0;
    let mut low_score = 0;
    let mut high_score = 0;
    let mut inner_sum = 1.0;
    score_probs[0] = 1.0;

    // lattice-reduced probabilities, indexed from the reduced low
    let reduced: Vec<f64> = (0..=range)
        .map(|i| sfp.prob(orig_low + i * divisor))
        .collect();

    let mut iter = 0;
    while iter < K_ITER_MAX && inner_sum > K_SUMLIMIT {
        let mut first = range;
        let mut last = range;
        low_score += low;
        high_score += high;

        let mut p = (high_score - low_score) as isize;
        while p >= 0 {
            let mut q = p - first as isize;
            let qe = p - last as isize;
            let mut r = first as isize;

            inner_sum = 0.0;
            while q >= qe {
                inner_sum += score_probs[q as usize] * reduced[r as usize];
                q -= 1;
                r += 1;
            }
            if first > 0 {
                first -= 1;
            }
            if p <= range as isize {
                last -= 1;
            }
            score_probs[p as usize] = inner_sum;
            p -= 1;
        }

        let mut p = 0usize;
        inner_sum = score_probs[p];
        let mut i = low_score + 1;
        while i < 0 {
            p += 1;
            inner_sum = score_probs[p] + inner_sum * exp_minus_lambda;
            i += 1;
        }
        inner_sum *= exp_minus_lambda;
        while i <= high_score {
            p += 1;
            inner_sum += score_probs[p];
            i += 1;
        }

        iter += 1;
        inner_sum /= iter as f64;
        outer_sum += inner_sum;
    }

    if iter >= K_ITER_MAX && inner_sum > K_SUMLIMIT {
        return Err("K computation did not converge".to_string());
    }

    let k = (-2.0 * outer_sum).exp() / (first_term * -expm1(-lambda));
    if k <= 0.0 || !k.is_finite() {
        return Err("computed K is not positive".to_string());
    }
    Ok(k)
}

/// Compute ungapped Karlin-Altschul parameters from a score frequency
/// profile. Errors are reported back to the score builder, which downgrades
/// bit scores and e-values for the affected context while raw scores stay
/// available.
pub fn calibrate_ungapped(sfp: &ScoreFreqProfile) -> Result<KarlinParams, String> {
    let lambda = lambda_from_profile(sfp)?;
    let h = h_from_lambda(sfp, lambda)?;
    let k = k_from_lambda_h(sfp, lambda, h)?;

    // ungapped alpha is lambda/H; beta is zero
    Ok(KarlinParams {
        lambda,
        k,
        h,
        alpha: lambda / h,
        beta: 0.0,
    })
}
