//! Karlin-Altschul statistics: parameters, calibration, search-space
//! normalization, and sum statistics for linked HSP sets.

pub mod calibrate;
pub mod karlin;
pub mod search_space;
pub mod sum;

pub use calibrate::{calibrate_ungapped, standard_profile, ScoreFreqProfile};
pub use karlin::{bit_score, evalue_from_bit_score, evalue_from_raw, KarlinParams};
pub use search_space::SearchSpace;
