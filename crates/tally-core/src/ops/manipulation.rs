//! Tensor manipulation operations: cat, stack, select.

use crate::dtype::Element;
use crate::error::TallyError;
use crate::tensor::Tensor;
use crate::{with_dtype, Result};

impl Tensor {
    /// Concatenate tensors along a given axis.
    ///
    /// All tensors must share dtype, device, rank, and every dimension
    /// except `axis`.
    pub fn cat(tensors: &[&Tensor], axis: isize) -> Result<Tensor> {
        let first = *tensors
            .first()
            .ok_or_else(|| TallyError::StorageError("cat: empty tensor list".into()))?;
        let ndim = first.ndim();
        if ndim == 0 {
            return Err(TallyError::StorageError("cat: cannot concatenate scalars".into()));
        }

        let axis = if axis < 0 { ndim as isize + axis } else { axis };
        if axis < 0 || axis as usize >= ndim {
            return Err(TallyError::InvalidAxis {
                axis: axis.unsigned_abs(),
                ndim,
            });
        }
        let axis = axis as usize;

        // Validate dtype, device and shapes on all non-cat axes
        for t in &tensors[1..] {
            if t.dtype() != first.dtype() {
                return Err(TallyError::DTypeMismatch {
                    expected: first.dtype(),
                    got: t.dtype(),
                });
            }
            if t.device() != first.device() {
                return Err(TallyError::DeviceMismatch {
                    expected: first.device(),
                    got: t.device(),
                });
            }
            let compatible = t.ndim() == ndim
                && (0..ndim).all(|d| d == axis || t.shape().dims()[d] == first.shape().dims()[d]);
            if !compatible {
                return Err(TallyError::ShapeMismatch {
                    expected: first.shape().dims().to_vec(),
                    got: t.shape().dims().to_vec(),
                });
            }
        }

        let mut out_shape: Vec<usize> = first.shape().dims().to_vec();
        out_shape[axis] = tensors.iter().map(|t| t.shape().dims()[axis]).sum();

        #[cfg(feature = "cuda")]
        {
            if first.is_cuda() {
                return crate::ops::cuda_ops::cuda_cat(tensors, axis, &out_shape);
            }
        }

        with_dtype!(first.dtype(), T => cat_typed::<T>(tensors, axis, &out_shape))
    }

    /// Stack tensors along a new axis.
    ///
    /// All tensors must have the same shape. A new dimension is inserted at `axis`.
    pub fn stack(tensors: &[&Tensor], axis: isize) -> Result<Tensor> {
        let first = *tensors
            .first()
            .ok_or_else(|| TallyError::StorageError("stack: empty tensor list".into()))?;
        let ndim = first.ndim();
        let axis = if axis < 0 { ndim as isize + 1 + axis } else { axis };
        if axis < 0 || axis as usize > ndim {
            return Err(TallyError::InvalidAxis {
                axis: axis.unsigned_abs(),
                ndim: ndim + 1,
            });
        }
        let axis = axis as usize;

        for t in &tensors[1..] {
            if t.shape() != first.shape() {
                return Err(TallyError::ShapeMismatch {
                    expected: first.shape().dims().to_vec(),
                    got: t.shape().dims().to_vec(),
                });
            }
        }

        // Unsqueeze each tensor at axis, then cat
        let mut unsqueezed: Vec<Tensor> = Vec::with_capacity(tensors.len());
        for t in tensors {
            let mut new_shape: Vec<isize> = t.shape().dims().iter().map(|&d| d as isize).collect();
            new_shape.insert(axis, 1);
            unsqueezed.push(t.contiguous()?.reshape(&new_shape)?);
        }

        let refs: Vec<&Tensor> = unsqueezed.iter().collect();
        Tensor::cat(&refs, axis as isize)
    }

    /// Slice out position `index` of `axis`, dropping that dimension.
    ///
    /// On CPU this is a zero-copy strided view; on CUDA the slice is
    /// gathered into a fresh buffer.
    pub fn select(&self, axis: usize, index: usize) -> Result<Tensor> {
        let size = self.shape().dim(axis).ok_or(TallyError::InvalidAxis {
            axis,
            ndim: self.ndim(),
        })?;
        if index >= size {
            return Err(TallyError::IndexOutOfBounds { index, axis, size });
        }

        #[cfg(feature = "cuda")]
        {
            if self.is_cuda() {
                return crate::ops::cuda_ops::cuda_select(self, axis, index);
            }
        }

        let shape = self.shape().without_axis(axis).ok_or(TallyError::InvalidAxis {
            axis,
            ndim: self.ndim(),
        })?;
        let mut strides = self.strides.clone();
        let stride = strides.remove(axis);
        Ok(Tensor {
            storage: self.storage.clone(),
            shape,
            strides,
            offset: self.offset + index * stride,
        })
    }
}

fn cat_typed<T: Element>(tensors: &[&Tensor], axis: usize, out_shape: &[usize]) -> Result<Tensor> {
    let outer: usize = out_shape[..axis].iter().product();
    let inner: usize = out_shape[axis + 1..].iter().product();

    let parts = tensors
        .iter()
        .map(|t| t.contiguous())
        .collect::<Result<Vec<_>>>()?;
    let slices = parts
        .iter()
        .map(|t| t.host_slice::<T>("cat"))
        .collect::<Result<Vec<_>>>()?;

    let mut result: Vec<T> = Vec::with_capacity(out_shape.iter().product());
    for o in 0..outer {
        for (t, data) in parts.iter().zip(&slices) {
            let chunk = t.shape().dims()[axis] * inner;
            result.extend_from_slice(&data[o * chunk..(o + 1) * chunk]);
        }
    }

    Ok(Tensor::from_slice(&result, out_shape))
}
