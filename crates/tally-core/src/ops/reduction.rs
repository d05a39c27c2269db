//! Reduction operations: max over all elements and max along an axis.

use rayon::prelude::*;

use crate::dtype::Element;
use crate::error::TallyError;
use crate::ops::PAR_THRESHOLD;
use crate::tensor::Tensor;
use crate::{with_dtype, Result};

impl Tensor {
    /// Maximum element, returning a scalar tensor of the same dtype and device.
    ///
    /// An empty tensor reduces to the dtype's identity (`-inf` or `MIN`).
    pub fn max(&self) -> Result<Tensor> {
        #[cfg(feature = "cuda")]
        {
            if self.is_cuda() {
                return crate::ops::cuda_ops::cuda_max(self);
            }
        }

        let data = self.contiguous()?;
        with_dtype!(data.dtype(), T => {
            let slice = data.host_slice::<T>("max")?;
            Ok(Tensor::scalar(max_of_slice(slice)))
        })
    }

    /// Maximum along `axis`, removing that dimension.
    ///
    /// This is the single-pass built-in reduction: one sweep over the
    /// contiguous data, folding each row of the reduced axis into an
    /// accumulator of the output's shape.
    pub fn max_axis(&self, axis: usize) -> Result<Tensor> {
        let (outer, axis_size, inner) = self
            .shape()
            .split_at_axis(axis)
            .ok_or(TallyError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            })?;
        let out_shape = self.shape().without_axis(axis).ok_or(TallyError::InvalidAxis {
            axis,
            ndim: self.ndim(),
        })?;

        #[cfg(feature = "cuda")]
        {
            if self.is_cuda() {
                return crate::ops::cuda_ops::cuda_max_axis(
                    self,
                    (outer, axis_size, inner),
                    out_shape.dims(),
                );
            }
        }

        let data = self.contiguous()?;
        with_dtype!(data.dtype(), T => {
            let slice = data.host_slice::<T>("max_axis")?;
            let result = max_along(slice, outer, axis_size, inner);
            Ok(Tensor::from_slice(&result, out_shape.dims()))
        })
    }
}

fn max_of_slice<T: Element>(slice: &[T]) -> T {
    if slice.len() >= PAR_THRESHOLD {
        slice.par_iter().copied().reduce(|| T::MAX_IDENTITY, T::max_of)
    } else {
        slice.iter().copied().fold(T::MAX_IDENTITY, T::max_of)
    }
}

/// Fold `slice` viewed as `[outer, axis_size, inner]` over its middle axis.
fn max_along<T: Element>(slice: &[T], outer: usize, axis_size: usize, inner: usize) -> Vec<T> {
    let mut result = vec![T::MAX_IDENTITY; outer * inner];
    if result.is_empty() || axis_size == 0 {
        return result;
    }

    let fold_block = |o: usize, acc: &mut [T]| {
        let block = &slice[o * axis_size * inner..(o + 1) * axis_size * inner];
        for row in block.chunks_exact(inner) {
            for (a, &v) in acc.iter_mut().zip(row) {
                *a = (*a).max_of(v);
            }
        }
    };

    if slice.len() >= PAR_THRESHOLD && outer > 1 {
        result
            .par_chunks_mut(inner)
            .enumerate()
            .for_each(|(o, acc)| fold_block(o, acc));
    } else {
        for (o, acc) in result.chunks_mut(inner).enumerate() {
            fold_block(o, acc);
        }
    }
    result
}
