//! Ascending sort and sortedness checks for rank-1 tensors.

use rayon::slice::ParallelSliceMut;

use crate::dtype::Element;
use crate::error::TallyError;
use crate::ops::PAR_THRESHOLD;
use crate::tensor::Tensor;
use crate::{with_dtype, Result};

impl Tensor {
    /// Ascending copy of a rank-1 tensor. The input is left untouched.
    ///
    /// The sort is unstable; equal elements carry no identity, so only the
    /// multiset of values matters. Floats use IEEE total order.
    pub fn sort(&self) -> Result<Tensor> {
        ensure_rank1(self)?;
        self.require_cpu("sort")?;
        with_dtype!(self.dtype(), T => {
            let mut data = self.to_vec::<T>()?;
            if data.len() >= PAR_THRESHOLD {
                data.par_sort_unstable_by(<T as Element>::total_cmp);
            } else {
                data.sort_unstable_by(<T as Element>::total_cmp);
            }
            Ok(Tensor::from_slice(&data, &[data.len()]))
        })
    }

    /// Whether every adjacent pair of a rank-1 tensor satisfies `a <= b`.
    pub fn is_sorted(&self) -> Result<bool> {
        ensure_rank1(self)?;
        self.require_cpu("is_sorted")?;
        let data = self.contiguous()?;
        with_dtype!(data.dtype(), T => {
            let slice = data.host_slice::<T>("is_sorted")?;
            Ok(slice.windows(2).all(|w| w[0] <= w[1]))
        })
    }
}

pub(crate) fn ensure_rank1(t: &Tensor) -> Result<()> {
    if t.ndim() == 1 {
        Ok(())
    } else {
        Err(TallyError::InvalidShape {
            expected: 1,
            got: t.ndim(),
        })
    }
}
