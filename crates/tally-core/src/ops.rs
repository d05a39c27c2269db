//! Tensor operations: reduction, comparison, manipulation, sorting, counting.
//!
//! All operations return new tensors (functional style); inputs are never
//! mutated.

pub mod reduction;
pub mod comparison;
pub mod manipulation;
pub mod sorting;
pub mod counting;
#[cfg(feature = "cuda")]
pub mod cuda_ops;

/// Element count above which CPU ops fan out over rayon.
pub(crate) const PAR_THRESHOLD: usize = 8192;
