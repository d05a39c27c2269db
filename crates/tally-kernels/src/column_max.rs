//! Axis maximum composed from `select`, whole-tensor `max` and `stack`.
//!
//! Instead of one strided pass, the input is split into the slices that run
//! along the reduced axis, each slice is reduced on its own, and the scalar
//! results are stacked back into a vector. Benchmarks compare this against
//! `Tensor::max_axis`.

use tally_core::{Result, TallyError, Tensor};

/// Maximum along `axis` of a 1-D or 2-D tensor.
///
/// A 1-D input of length `N` is treated as an `N x 1` column. For `axis`,
/// the other dimension `keep = 1 - axis` is walked in order and output
/// element `i` is `max(select(keep, i))`. The result is rank 1 with the
/// input's dtype and device.
///
/// An empty reduced dimension yields the dtype's max-identity, the same as
/// `Tensor::max`. An empty kept dimension yields an empty tensor.
///
/// # Example
///
/// ```
/// use tally_core::Tensor;
/// use tally_kernels::column_max;
///
/// let t = Tensor::from_i64(&[1, 5, 3, 2, 0, 9], &[3, 2]);
/// assert_eq!(column_max(&t, 0).unwrap().as_i64_slice().unwrap(), &[3, 9]);
/// assert_eq!(column_max(&t, 1).unwrap().as_i64_slice().unwrap(), &[5, 3, 9]);
/// ```
pub fn column_max(input: &Tensor, axis: usize) -> Result<Tensor> {
    let matrix = match input.ndim() {
        1 => input.contiguous()?.reshape(&[input.numel() as isize, 1])?,
        2 => input.clone(),
        got => return Err(TallyError::InvalidShape { expected: 2, got }),
    };
    if axis > 1 {
        return Err(TallyError::InvalidAxis { axis, ndim: 2 });
    }

    let keep = 1 - axis;
    let slices = matrix.shape().dims()[keep];
    tracing::trace!(
        "column_max: {} slices of {} along axis {} on {}",
        slices,
        matrix.shape().dims()[axis],
        axis,
        matrix.device()
    );
    if slices == 0 {
        return Tensor::zeros(&[0], matrix.dtype()).to(matrix.device());
    }

    let maxima = (0..slices)
        .map(|i| matrix.select(keep, i)?.max())
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&Tensor> = maxima.iter().collect();
    Tensor::stack(&refs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::DType;

    fn example() -> Tensor {
        Tensor::from_f32(&[1.0, 5.0, 3.0, 2.0, 0.0, 9.0], &[3, 2])
    }

    #[test]
    fn test_column_max_axis0() {
        let out = column_max(&example(), 0).unwrap();
        assert_eq!(out.shape().dims(), &[2]);
        assert_eq!(out.as_f32_slice().unwrap(), &[3.0, 9.0]);
    }

    #[test]
    fn test_column_max_axis1() {
        let out = column_max(&example(), 1).unwrap();
        assert_eq!(out.shape().dims(), &[3]);
        assert_eq!(out.as_f32_slice().unwrap(), &[5.0, 3.0, 9.0]);
    }

    #[test]
    fn test_column_max_matches_max_axis() {
        let t = Tensor::from_i64(&[4, -2, 7, 0, 3, 3, -8, 11, 6, 1, 2, 5], &[4, 3]);
        for axis in 0..2 {
            let ours = column_max(&t, axis).unwrap();
            let reference = t.max_axis(axis).unwrap();
            assert!(ours.equal(&reference).unwrap(), "axis {axis}");
        }
    }

    #[test]
    fn test_column_max_1d() {
        let v = Tensor::from_i64(&[4, 8, 1, 8, 2], &[5]);
        let out = column_max(&v, 0).unwrap();
        assert_eq!(out.shape().dims(), &[1]);
        assert_eq!(out.as_i64_slice().unwrap(), &[8]);

        // axis 1 reduces each length-1 row, returning the input values
        let rows = column_max(&v, 1).unwrap();
        assert_eq!(rows.as_i64_slice().unwrap(), &[4, 8, 1, 8, 2]);
    }

    #[test]
    fn test_column_max_keeps_dtype() {
        let t = Tensor::from_slice(&[3i32, 1, 2, 7], &[2, 2]);
        let out = column_max(&t, 0).unwrap();
        assert_eq!(out.dtype(), DType::I32);
        assert_eq!(out.as_slice::<i32>().unwrap(), &[3, 7]);
    }

    #[test]
    fn test_column_max_does_not_mutate() {
        let t = example();
        let _ = column_max(&t, 0).unwrap();
        assert_eq!(t.as_f32_slice().unwrap(), &[1.0, 5.0, 3.0, 2.0, 0.0, 9.0]);
    }

    #[test]
    fn test_column_max_empty_kept_dim() {
        let t = Tensor::zeros(&[0, 3], DType::F32);
        let out = column_max(&t, 1).unwrap();
        assert_eq!(out.shape().dims(), &[0]);
        assert_eq!(out.dtype(), DType::F32);
    }

    #[test]
    fn test_column_max_empty_reduced_dim() {
        let t = Tensor::zeros(&[0, 2], DType::I64);
        let out = column_max(&t, 0).unwrap();
        assert_eq!(out.as_i64_slice().unwrap(), &[i64::MIN, i64::MIN]);
    }

    #[test]
    fn test_column_max_errors() {
        let t = example();
        assert!(matches!(
            column_max(&t, 2),
            Err(TallyError::InvalidAxis { axis: 2, ndim: 2 })
        ));

        let cube = Tensor::zeros(&[2, 2, 2], DType::F32);
        assert!(matches!(
            column_max(&cube, 0),
            Err(TallyError::InvalidShape { expected: 2, got: 3 })
        ));
    }
}
