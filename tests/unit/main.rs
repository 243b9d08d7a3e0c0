//! Unit test infrastructure for bandlink.
//!
//! Tests are organized by concern:
//! - `scenarios` - end-to-end driver batches (thresholds, timeouts, strands)
//! - `linking` - sum-statistics linking against the statistics layer
//! - `scoring` - score builder and Karlin-Altschul conversions

mod helpers;
mod linking;
mod scenarios;
mod scoring;
