//! # tally-kernels
//!
//! Reductions and counting built by composing `tally-core` primitives.
//!
//! Provides:
//! - `column_max`: per-slice maxima along an axis, stacked
//! - `grouped_count`: occurrence counts from sorted run boundaries
//! - `grouped_count_dense`: the same scan written into a dense histogram
//! - Device-synchronized timing (`timing`) and parity helpers (`verify`)

pub mod column_max;
pub mod grouped_count;
pub mod timing;
pub mod verify;

pub use column_max::column_max;
pub use grouped_count::{grouped_count, grouped_count_dense};
pub use timing::{time_it, BenchStats};
pub use verify::{covers_contiguous_range, verify_equal};
