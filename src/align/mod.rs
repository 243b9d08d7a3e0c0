//! Banded and full dynamic-programming alignment plus the aligner drivers.

pub mod banded;
pub mod driver;
pub mod result;
pub mod traceback;

pub use banded::{best_diagonal, global_banded, global_full, local_align, LocalResult};
pub use driver::{
    AlignerFactory, AlignerKind, AlignmentEngine, DriverParams, InstancedAligner,
    SimpleBandedAligner,
};
pub use result::{AlignOutcome, EditOp};
