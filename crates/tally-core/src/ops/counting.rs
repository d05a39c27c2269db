//! Occurrence counting over non-negative integer tensors.

use crate::dtype::DType;
use crate::error::TallyError;
use crate::ops::sorting::ensure_rank1;
use crate::tensor::Tensor;
use crate::Result;

impl Tensor {
    /// Dense histogram with unit-width bins starting at zero.
    ///
    /// For a rank-1 tensor of non-negative integers, returns an `I64` tensor
    /// of length `max + 1` whose entry `k` counts the occurrences of `k`.
    /// Values absent from the input get a zero bucket. Works on unsorted
    /// input by scatter-adding every element.
    ///
    /// GPU tensors are counted on a host copy; the result is placed back on
    /// the input's device.
    pub fn bincount(&self) -> Result<Tensor> {
        ensure_rank1(self)?;
        let values = self.to_i64_vec()?;
        if let Some(&negative) = values.iter().find(|&&v| v < 0) {
            return Err(TallyError::NegativeValue(negative));
        }

        let mut counts = match values.iter().max() {
            Some(&max) => zeroed_counts(max)?,
            None => Vec::new(),
        };
        for &v in &values {
            counts[v as usize] += 1;
        }
        let len = counts.len();
        Tensor::from_i64(&counts, &[len]).to(self.device())
    }

    /// Copy an integer tensor to the host as `i64`, widening `I32`.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        match self.dtype() {
            DType::I64 => self.to_vec::<i64>(),
            DType::I32 => Ok(self.to_vec::<i32>()?.into_iter().map(i64::from).collect()),
            other => Err(TallyError::UnsupportedDType(other)),
        }
    }
}

/// Zeroed histogram buckets for values `0..=max_value`.
///
/// Fails with [`TallyError::NegativeValue`] for a negative maximum and with
/// [`TallyError::StorageError`] when `max_value + 1` buckets cannot be
/// allocated.
pub fn zeroed_counts(max_value: i64) -> Result<Vec<i64>> {
    if max_value < 0 {
        return Err(TallyError::NegativeValue(max_value));
    }
    let len = usize::try_from(max_value)
        .ok()
        .and_then(|m| m.checked_add(1))
        .ok_or_else(|| {
            TallyError::StorageError(format!("histogram for max value {max_value} is too long"))
        })?;
    let mut counts = Vec::new();
    counts.try_reserve_exact(len).map_err(|e| {
        TallyError::StorageError(format!("cannot allocate {len} histogram buckets: {e}"))
    })?;
    counts.resize(len, 0);
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::zeroed_counts;
    use crate::{DType, TallyError, Tensor};

    #[test]
    fn test_bincount_dense() {
        let t = Tensor::from_i64(&[0, 0, 1, 2, 2, 2, 5], &[7]);
        let c = t.bincount().unwrap();
        assert_eq!(c.dtype(), DType::I64);
        assert_eq!(c.as_i64_slice().unwrap(), &[2, 1, 3, 0, 0, 1]);
    }

    #[test]
    fn test_bincount_unsorted_i32() {
        let t = Tensor::from_slice(&[3i32, 1, 3, 0], &[4]);
        assert_eq!(t.bincount().unwrap().as_i64_slice().unwrap(), &[1, 1, 0, 2]);
    }

    #[test]
    fn test_bincount_empty() {
        let t = Tensor::from_i64(&[], &[0]);
        let c = t.bincount().unwrap();
        assert_eq!(c.shape().dims(), &[0]);
    }

    #[test]
    fn test_bincount_rejects_negative() {
        let t = Tensor::from_i64(&[1, -3, 2], &[3]);
        assert!(matches!(t.bincount(), Err(TallyError::NegativeValue(-3))));
    }

    #[test]
    fn test_bincount_rejects_floats_and_rank() {
        let f = Tensor::from_f32(&[1.0], &[1]);
        assert!(matches!(f.bincount(), Err(TallyError::UnsupportedDType(DType::F32))));

        let m = Tensor::from_i64(&[1, 2, 3, 4], &[2, 2]);
        assert!(matches!(
            m.bincount(),
            Err(TallyError::InvalidShape { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_bincount_huge_value_is_an_error() {
        let t = Tensor::from_i64(&[i64::MAX], &[1]);
        assert!(matches!(t.bincount(), Err(TallyError::StorageError(_))));
    }

    #[test]
    fn test_zeroed_counts() {
        assert_eq!(zeroed_counts(3).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(zeroed_counts(0).unwrap(), vec![0]);
        assert!(matches!(zeroed_counts(-2), Err(TallyError::NegativeValue(-2))));
        assert!(matches!(zeroed_counts(i64::MAX), Err(TallyError::StorageError(_))));
    }
}
