//! # tally-core
//!
//! Core tensor engine for tally.
//!
//! Provides the foundational `Tensor` type with:
//! - Plain numeric dtypes (F32, F64, I32, I64)
//! - CPU and CUDA device support
//! - Zero-copy views (reshape, select)
//! - Reference reductions, sorting and counting used as parity baselines

pub mod dtype;
pub mod device;
pub mod storage;
pub mod shape;
pub mod tensor;
pub mod ops;
pub mod error;
pub mod prelude;

pub use dtype::{DType, Element};
pub use device::Device;
pub use storage::Storage;
pub use shape::Shape;
pub use tensor::Tensor;
pub use error::TallyError;

pub type Result<T> = std::result::Result<T, TallyError>;
