use thiserror::Error;

use crate::{DType, Device};

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    /// Rank check failed; `got` is the observed number of dimensions.
    #[error("Invalid shape: expected a {expected}-D tensor, got {got}-D")]
    InvalidShape { expected: usize, got: usize },

    #[error("DType mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    #[error("Device mismatch: expected {expected}, got {got}")]
    DeviceMismatch { expected: Device, got: Device },

    #[error("Cannot reshape tensor of {numel} elements into shape {shape:?}")]
    InvalidReshape { numel: usize, shape: Vec<isize> },

    #[error("Index {index} out of bounds for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Operation not supported for dtype {0}")]
    UnsupportedDType(DType),

    #[error("Operation '{op}' not supported on device {device}")]
    UnsupportedDevice { op: &'static str, device: Device },

    #[error("Counting requires non-negative values, found {0}")]
    NegativeValue(i64),

    #[error("Parity check failed for {op}: expected {expected}, got {got}")]
    ParityMismatch {
        op: String,
        expected: String,
        got: String,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("CUDA error: {0}")]
    CudaError(String),
}
