//! Shared fixtures for the unit tests.

use bandlink::matrix::SubstMatrix;
use bandlink::score::ScoringConfig;
use bandlink::sequence::MemorySequenceSource;
use bandlink::stats::{calibrate_ungapped, standard_profile, KarlinParams, SearchSpace};

/// +1/-1 nucleotide scoring, the simplest calibratable system.
pub fn plus_minus_one() -> SubstMatrix {
    SubstMatrix::Simple {
        reward: 1,
        penalty: -1,
    }
}

/// Calibrated ungapped parameters for a matrix.
pub fn calibrated(matrix: &SubstMatrix) -> KarlinParams {
    calibrate_ungapped(&standard_profile(matrix)).expect("calibration must converge")
}

/// A ready-to-use scoring configuration with gap costs and a simple
/// effective search space set.
pub fn config_with_space(matrix: SubstMatrix, query_len: usize, db_len: usize) -> ScoringConfig {
    let karlin = calibrated(&matrix);
    let mut config = ScoringConfig::new(matrix, karlin);
    config.set_gap_open(2);
    config.set_gap_extend(1);
    config.set_effective_search_space(SearchSpace::simple(query_len, db_len));
    config
}

/// Repeat `motif` up to exactly `len` residues.
pub fn repeat_seq(motif: &[u8], len: usize) -> Vec<u8> {
    motif.iter().cycle().take(len).copied().collect()
}

/// Scope preloaded with the given (id, sequence) entries.
pub fn scope_with(entries: &[(&str, &[u8])]) -> MemorySequenceSource {
    let mut scope = MemorySequenceSource::new();
    for (id, seq) in entries {
        scope.insert(id.to_string(), seq.to_vec());
    }
    scope
}
