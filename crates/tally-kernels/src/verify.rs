//! Parity checks between a kernel and its reference op.

use tally_core::{Result, TallyError, Tensor};

/// Fail with [`TallyError::ParityMismatch`] unless `actual` equals `expected`
/// exactly (shape, dtype and every element). Tensors on a GPU are copied to
/// the host for the comparison and the error message.
pub fn verify_equal(op: &str, actual: &Tensor, expected: &Tensor) -> Result<()> {
    if actual.equal(expected)? {
        tracing::debug!("{}: parity ok ({})", op, actual.shape());
        return Ok(());
    }
    Err(TallyError::ParityMismatch {
        op: op.to_string(),
        expected: host_render(expected)?,
        got: host_render(actual)?,
    })
}

/// Whether a dense histogram has no empty bucket, i.e. the counted input
/// held every integer from zero to its maximum.
pub fn covers_contiguous_range(counts: &Tensor) -> Result<bool> {
    Ok(counts.to_i64_vec()?.iter().all(|&c| c > 0))
}

fn host_render(t: &Tensor) -> Result<String> {
    Ok(t.cpu()?.contiguous()?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_equal_ok() {
        let a = Tensor::from_i64(&[3, 9], &[2]);
        assert!(verify_equal("column_max", &a, &a.clone()).is_ok());
    }

    #[test]
    fn test_verify_equal_reports_both_sides() {
        let a = Tensor::from_i64(&[2, 1, 3, 1], &[4]);
        let b = Tensor::from_i64(&[2, 1, 3, 0, 0, 1], &[6]);
        match verify_equal("grouped_count", &a, &b) {
            Err(TallyError::ParityMismatch { op, expected, got }) => {
                assert_eq!(op, "grouped_count");
                assert!(expected.contains("[2, 1, 3, 0, 0, 1]"));
                assert!(got.contains("[2, 1, 3, 1]"));
            }
            other => panic!("expected ParityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_equal_renders_views() {
        let t = Tensor::from_i64(&[1, 5, 3, 2], &[2, 2]);
        let col = t.select(1, 0).unwrap();
        let err = verify_equal("select", &col, &Tensor::from_i64(&[1, 2], &[2])).unwrap_err();
        assert!(err.to_string().contains("[1, 3]"));
    }

    #[test]
    fn test_covers_contiguous_range() {
        assert!(covers_contiguous_range(&Tensor::from_i64(&[1, 2, 1, 3], &[4])).unwrap());
        assert!(!covers_contiguous_range(&Tensor::from_i64(&[2, 1, 3, 0, 0, 1], &[6])).unwrap());
        assert!(covers_contiguous_range(&Tensor::from_i64(&[], &[0])).unwrap());
    }
}
