//! Whole-tensor comparison used for parity checks.

use crate::dtype::Element;
use crate::error::TallyError;
use crate::tensor::Tensor;
use crate::{with_dtype, Result};

impl Tensor {
    /// Exact equality: same shape, same dtype and identical elements.
    ///
    /// Tensors on different devices are compared after copying both to the
    /// host. As with IEEE comparison, a NaN never equals anything.
    pub fn equal(&self, other: &Tensor) -> Result<bool> {
        if self.shape() != other.shape() || self.dtype() != other.dtype() {
            return Ok(false);
        }
        with_dtype!(self.dtype(), T => Ok(self.to_vec::<T>()? == other.to_vec::<T>()?))
    }

    /// Element-wise `|a - b| <= atol + rtol * |b|` over tensors of equal shape.
    ///
    /// Both tensors are widened to `f64`, so integer and float tensors can
    /// be compared against each other.
    pub fn allclose(&self, other: &Tensor, rtol: f64, atol: f64) -> Result<bool> {
        if self.shape() != other.shape() {
            return Err(TallyError::ShapeMismatch {
                expected: self.shape().dims().to_vec(),
                got: other.shape().dims().to_vec(),
            });
        }
        let a = self.to_f64_vec()?;
        let b = other.to_f64_vec()?;
        Ok(a.iter()
            .zip(b.iter())
            .all(|(&x, &y)| (x - y).abs() <= atol + rtol * y.abs()))
    }

    fn to_f64_vec(&self) -> Result<Vec<f64>> {
        with_dtype!(self.dtype(), T => Ok(self
            .to_vec::<T>()?
            .into_iter()
            .map(Element::to_f64)
            .collect()))
    }
}
