//! GPU integration tests for the tally CUDA backend.
//! Run with: cargo test -p tally-core --features cuda -- --nocapture

#![cfg(feature = "cuda")]

use rand::rngs::StdRng;
use rand::SeedableRng;
use tally_core::{DType, Device, TallyError, Tensor};

fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len(), "length mismatch: {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).abs() < tol,
            "element {} differs: {} vs {} (tol={})",
            i, x, y, tol
        );
    }
}

// ============================================================================
// Device transfer tests
// ============================================================================

#[test]
fn test_cpu_to_cuda_roundtrip() {
    let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let cpu_tensor = Tensor::from_f32(&data, &[2, 3]);
    assert!(cpu_tensor.is_cpu());

    let gpu_tensor = cpu_tensor.cuda(0).expect("Failed to move to GPU");
    assert!(gpu_tensor.is_cuda());
    assert_eq!(gpu_tensor.device(), Device::Cuda(0));
    assert_eq!(gpu_tensor.shape().dims(), &[2, 3]);

    let back = gpu_tensor.cpu().expect("Failed to move back to CPU");
    assert!(back.is_cpu());
    assert_eq!(back.as_f32_slice().unwrap(), &data);
}

#[test]
fn test_integer_roundtrip() {
    let data = vec![0i64, -7, 1 << 40, 3];
    let back = Tensor::from_i64(&data, &[4]).cuda(0).unwrap().cpu().unwrap();
    assert_eq!(back.dtype(), DType::I64);
    assert_eq!(back.as_i64_slice().unwrap(), &data);
}

#[test]
fn test_synchronize_and_count() {
    assert!(Device::cuda_device_count() >= 1);
    Device::Cuda(0).synchronize().unwrap();
}

// ============================================================================
// Reductions
// ============================================================================

#[test]
fn test_cuda_max_matches_cpu() {
    let mut rng = StdRng::seed_from_u64(7);
    let t = Tensor::rand_uniform_with(&mut rng, &[100_003], -50.0, 50.0);
    let cpu = t.max().unwrap();
    let gpu = t.cuda(0).unwrap().max().unwrap();
    assert!(gpu.is_cuda());
    assert!(gpu.cpu().unwrap().equal(&cpu).unwrap());
}

#[test]
fn test_cuda_max_axis_matches_cpu() {
    let mut rng = StdRng::seed_from_u64(11);
    let t = Tensor::rand_uniform_with(&mut rng, &[513, 77], 0.0, 1.0);
    let g = t.cuda(0).unwrap();
    for axis in 0..2 {
        let cpu = t.max_axis(axis).unwrap();
        let gpu = g.max_axis(axis).unwrap().cpu().unwrap();
        assert_eq!(gpu.shape(), cpu.shape());
        assert_close(gpu.as_f32_slice().unwrap(), cpu.as_f32_slice().unwrap(), 1e-6);
    }
}

#[test]
fn test_cuda_max_small() {
    let t = Tensor::from_f32(&[1.0, 5.0, 3.0, 2.0, 0.0, 9.0], &[3, 2]).cuda(0).unwrap();
    let col = t.max_axis(0).unwrap().cpu().unwrap();
    assert_eq!(col.as_f32_slice().unwrap(), &[3.0, 9.0]);
    let row = t.max_axis(1).unwrap().cpu().unwrap();
    assert_eq!(row.as_f32_slice().unwrap(), &[5.0, 3.0, 9.0]);
}

#[test]
fn test_cuda_max_skips_all_nan_block() {
    // the first 256-element block holds only NaN
    let mut data = vec![f32::NAN; 256];
    data.extend((0..300).map(|i| i as f32 * 0.5 - 20.0));
    let t = Tensor::from_f32(&data, &[data.len()]);
    let cpu = t.max().unwrap();
    let gpu = t.cuda(0).unwrap().max().unwrap().cpu().unwrap();
    assert_eq!(gpu.as_f32_slice().unwrap(), cpu.as_f32_slice().unwrap());
    assert_eq!(gpu.as_f32_slice().unwrap(), &[129.5]);
}

#[test]
fn test_cuda_max_all_nan_is_identity() {
    let t = Tensor::from_f32(&[f32::NAN; 600], &[600]).cuda(0).unwrap();
    let m = t.max().unwrap().cpu().unwrap();
    assert_eq!(m.as_f32_slice().unwrap(), &[f32::NEG_INFINITY]);
}

#[test]
fn test_cuda_max_rejects_integers() {
    let t = Tensor::from_i64(&[1, 2, 3], &[3]).cuda(0).unwrap();
    assert!(matches!(t.max(), Err(TallyError::UnsupportedDType(DType::I64))));
}

// ============================================================================
// Gathers and copies
// ============================================================================

#[test]
fn test_cuda_select() {
    let t = Tensor::from_f32(&[1.0, 5.0, 3.0, 2.0, 0.0, 9.0], &[3, 2]).cuda(0).unwrap();
    let col = t.select(1, 1).unwrap();
    assert!(col.is_cuda());
    assert_eq!(col.cpu().unwrap().as_f32_slice().unwrap(), &[5.0, 2.0, 9.0]);
}

#[test]
fn test_cuda_stack_of_maxima() {
    let t = Tensor::from_f32(&[1.0, 5.0, 3.0, 2.0, 0.0, 9.0], &[3, 2]).cuda(0).unwrap();
    let maxima: Vec<Tensor> = (0..2)
        .map(|c| t.select(1, c).unwrap().max().unwrap())
        .collect();
    let refs: Vec<&Tensor> = maxima.iter().collect();
    let stacked = Tensor::stack(&refs, 0).unwrap().cpu().unwrap();
    assert_eq!(stacked.as_f32_slice().unwrap(), &[3.0, 9.0]);
}

#[test]
fn test_cuda_cat_integers() {
    let a = Tensor::from_i64(&[1, 2, 3, 4], &[2, 2]).cuda(0).unwrap();
    let b = Tensor::from_i64(&[5, 6], &[2, 1]).cuda(0).unwrap();
    let c = Tensor::cat(&[&a, &b], 1).unwrap().cpu().unwrap();
    assert_eq!(c.as_i64_slice().unwrap(), &[1, 2, 5, 3, 4, 6]);
}

#[test]
fn test_cuda_bincount_returns_on_device() {
    let t = Tensor::from_i64(&[0, 0, 1, 2, 2, 2, 5], &[7]).cuda(0).unwrap();
    let c = t.bincount().unwrap();
    assert_eq!(c.device(), Device::Cuda(0));
    assert_eq!(c.cpu().unwrap().as_i64_slice().unwrap(), &[2, 1, 3, 0, 0, 1]);
}

#[test]
fn test_cuda_sort_unsupported() {
    let t = Tensor::from_i64(&[3, 1, 2], &[3]).cuda(0).unwrap();
    assert!(matches!(t.sort(), Err(TallyError::UnsupportedDevice { op: "sort", .. })));
}
