//! Occurrence counting from run boundaries of a sorted vector.
//!
//! After sorting, equal values sit in runs. The positions where a value
//! differs from its predecessor mark the run starts; together with `0` and
//! the length they form an index list whose successive differences are the
//! run lengths.
//!
//! Two result layouts are offered:
//! - [`grouped_count`] returns the run lengths as-is, so entry `k` counts the
//!   `k`-th smallest *distinct* value. It agrees with `bincount` only when the
//!   input covers every integer from zero to its maximum.
//! - [`grouped_count_dense`] writes each run length at the index equal to the
//!   run's value, which is exactly `bincount`.

use tally_core::ops::counting::zeroed_counts;
use tally_core::{Result, TallyError, Tensor};

/// Run lengths of the sorted input, in ascending value order.
///
/// Accepts a rank-1 `I32` or `I64` tensor. Unsorted input is sorted into a
/// copy first; the input itself is never modified. The result is a rank-1
/// `I64` tensor with one entry per distinct value, on the input's device.
///
/// ```
/// use tally_core::Tensor;
/// use tally_kernels::grouped_count;
///
/// let v = Tensor::from_i64(&[0, 0, 1, 2, 2, 2, 5], &[7]);
/// assert_eq!(grouped_count(&v).unwrap().as_i64_slice().unwrap(), &[2, 1, 3, 1]);
/// ```
pub fn grouped_count(input: &Tensor) -> Result<Tensor> {
    let runs = sorted_runs(input)?;
    let counts: Vec<i64> = runs.iter().map(|run| run.len).collect();
    Tensor::from_i64(&counts, &[counts.len()]).to(input.device())
}

/// Dense histogram built from the same run scan: entry `k` counts the
/// occurrences of value `k`, with zero buckets for values that never occur.
///
/// Fails with [`TallyError::NegativeValue`] on negative input.
pub fn grouped_count_dense(input: &Tensor) -> Result<Tensor> {
    let runs = sorted_runs(input)?;
    if let Some(first) = runs.first() {
        if first.value < 0 {
            return Err(TallyError::NegativeValue(first.value));
        }
    }

    let mut counts = match runs.last() {
        Some(last) => zeroed_counts(last.value)?,
        None => Vec::new(),
    };
    for run in &runs {
        counts[run.value as usize] = run.len;
    }
    let len = counts.len();
    Tensor::from_i64(&counts, &[len]).to(input.device())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    value: i64,
    len: i64,
}

fn sorted_runs(input: &Tensor) -> Result<Vec<Run>> {
    if input.ndim() != 1 {
        return Err(TallyError::InvalidShape {
            expected: 1,
            got: input.ndim(),
        });
    }
    if !input.dtype().is_integer() {
        return Err(TallyError::UnsupportedDType(input.dtype()));
    }

    // sort and sortedness checks run on the host; GPU input is copied over
    let host = input.cpu()?;
    let sorted = if host.is_sorted()? {
        tracing::debug!("grouped_count: {} elements already sorted", host.numel());
        host
    } else {
        tracing::debug!("grouped_count: sorting {} elements", host.numel());
        host.sort()?
    };
    let values = sorted.to_i64_vec()?;
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let bounds = run_bounds(&values);
    Ok(bounds
        .windows(2)
        .map(|w| Run {
            value: values[w[0]],
            len: (w[1] - w[0]) as i64,
        })
        .collect())
}

/// `[0, starts..., len]` where each start is a position whose value differs
/// from the one before it.
fn run_bounds(values: &[i64]) -> Vec<usize> {
    let mut bounds = Vec::with_capacity(values.len().min(1024) + 2);
    bounds.push(0);
    bounds.extend((1..values.len()).filter(|&i| values[i] != values[i - 1]));
    bounds.push(values.len());
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::DType;

    #[test]
    fn test_run_bounds() {
        assert_eq!(run_bounds(&[0, 0, 1, 2, 2, 2, 5]), vec![0, 2, 3, 6, 7]);
        assert_eq!(run_bounds(&[4]), vec![0, 1]);
        assert_eq!(run_bounds(&[3, 3, 3]), vec![0, 3]);
    }

    #[test]
    fn test_grouped_count_distinct_ranks() {
        let v = Tensor::from_i64(&[0, 0, 1, 2, 2, 2, 5], &[7]);
        let out = grouped_count(&v).unwrap();
        assert_eq!(out.dtype(), DType::I64);
        assert_eq!(out.as_i64_slice().unwrap(), &[2, 1, 3, 1]);
    }

    #[test]
    fn test_grouped_count_dense_matches_bincount() {
        let v = Tensor::from_i64(&[0, 0, 1, 2, 2, 2, 5], &[7]);
        let dense = grouped_count_dense(&v).unwrap();
        assert_eq!(dense.as_i64_slice().unwrap(), &[2, 1, 3, 0, 0, 1]);
        assert!(dense.equal(&v.bincount().unwrap()).unwrap());
    }

    #[test]
    fn test_grouped_count_contiguous_range_matches_bincount() {
        let v = Tensor::from_i64(&[0, 1, 1, 2, 3, 3, 3], &[7]);
        let out = grouped_count(&v).unwrap();
        assert_eq!(out.as_i64_slice().unwrap(), &[1, 2, 1, 3]);
        assert!(out.equal(&v.bincount().unwrap()).unwrap());
    }

    #[test]
    fn test_grouped_count_unsorted_input_untouched() {
        let v = Tensor::from_i64(&[2, 0, 2, 1, 0, 2], &[6]);
        assert_eq!(grouped_count(&v).unwrap().as_i64_slice().unwrap(), &[2, 1, 3]);
        assert_eq!(v.as_i64_slice().unwrap(), &[2, 0, 2, 1, 0, 2]);
    }

    #[test]
    fn test_grouped_count_i32() {
        let v = Tensor::from_slice(&[1i32, 3, 1], &[3]);
        assert_eq!(grouped_count(&v).unwrap().as_i64_slice().unwrap(), &[2, 1]);
        assert_eq!(
            grouped_count_dense(&v).unwrap().as_i64_slice().unwrap(),
            &[0, 2, 0, 1]
        );
    }

    #[test]
    fn test_grouped_count_empty() {
        let v = Tensor::from_i64(&[], &[0]);
        assert_eq!(grouped_count(&v).unwrap().shape().dims(), &[0]);
        assert_eq!(grouped_count_dense(&v).unwrap().shape().dims(), &[0]);
    }

    #[test]
    fn test_grouped_count_single_value() {
        let v = Tensor::from_i64(&[7, 7, 7], &[3]);
        assert_eq!(grouped_count(&v).unwrap().as_i64_slice().unwrap(), &[3]);
    }

    #[test]
    fn test_grouped_count_negative_values() {
        let v = Tensor::from_i64(&[-1, 2, -1], &[3]);
        // run lengths are defined for any integers
        assert_eq!(grouped_count(&v).unwrap().as_i64_slice().unwrap(), &[2, 1]);
        assert!(matches!(
            grouped_count_dense(&v),
            Err(TallyError::NegativeValue(-1))
        ));
    }

    #[test]
    fn test_grouped_count_rejects_matrix() {
        let m = Tensor::from_i64(&[0, 1, 2, 3], &[2, 2]);
        assert!(matches!(
            grouped_count(&m),
            Err(TallyError::InvalidShape { expected: 1, got: 2 })
        ));
        assert!(matches!(
            grouped_count_dense(&m),
            Err(TallyError::InvalidShape { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_grouped_count_rejects_floats() {
        let f = Tensor::from_f32(&[1.0, 1.0], &[2]);
        assert!(matches!(
            grouped_count(&f),
            Err(TallyError::UnsupportedDType(DType::F32))
        ));
    }

    #[test]
    fn test_grouped_count_dense_huge_value_is_an_error() {
        let v = Tensor::from_i64(&[i64::MAX], &[1]);
        assert!(matches!(
            grouped_count_dense(&v),
            Err(TallyError::StorageError(_))
        ));
        // run lengths need no histogram
        let pair = Tensor::from_i64(&[i64::MAX, 0], &[2]);
        assert_eq!(grouped_count(&pair).unwrap().as_i64_slice().unwrap(), &[1, 1]);
    }
}
