//! CUDA dispatch for tensor operations.
//!
//! Kernels are compiled from embedded CUDA source at runtime via NVRTC and
//! cached per device. Reductions and `select` run on F32 data; `cat` is a
//! sequence of device-to-device byte copies and works for every dtype.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cudarc::driver::{
    CudaDevice, CudaFunction, CudaSlice, CudaView, CudaViewMut, DeviceSlice, LaunchAsync,
    LaunchConfig,
};
use parking_lot::Mutex;

use crate::storage::Storage;
use crate::tensor::Tensor;
use crate::{DType, Device, Result, TallyError};

// ============================================================================
// Device registry
// ============================================================================

/// Global registry of CUDA device handles (one per GPU index).
static DEVICES: OnceLock<Mutex<HashMap<usize, Arc<CudaDevice>>>> = OnceLock::new();

fn devices() -> &'static Mutex<HashMap<usize, Arc<CudaDevice>>> {
    DEVICES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Get or create a CUDA device handle for the given GPU index.
pub(crate) fn device(device_idx: usize) -> Result<Arc<CudaDevice>> {
    let mut map = devices().lock();
    if let Some(dev) = map.get(&device_idx) {
        return Ok(Arc::clone(dev));
    }
    let dev = CudaDevice::new(device_idx)
        .map_err(|e| TallyError::CudaError(format!("device {} init: {}", device_idx, e)))?;
    tracing::debug!("initialized CUDA device {}", device_idx);
    map.insert(device_idx, Arc::clone(&dev));
    Ok(dev)
}

/// Block until all queued work on the device has completed.
pub(crate) fn synchronize(device_idx: usize) -> Result<()> {
    device(device_idx)?
        .synchronize()
        .map_err(|e| TallyError::CudaError(format!("synchronize cuda:{}: {}", device_idx, e)))
}

/// Number of usable CUDA devices.
pub fn device_count() -> usize {
    (0..16).take_while(|&i| device(i).is_ok()).count()
}

// ============================================================================
// PTX module loading
// ============================================================================

const REDUCE_CU: &str = include_str!("cuda_kernels/reduce.cu");

const REDUCE_FUNCS: &[&str] = &["reduce_max_f32", "reduce_max_axis_f32", "select_axis_f32"];

const BLOCK_SIZE: usize = 256;

/// Get a kernel from the `reduce` module, compiling it on first use.
fn get_func(dev: &Arc<CudaDevice>, func_name: &str) -> Result<CudaFunction> {
    if let Some(f) = dev.get_func("reduce", func_name) {
        return Ok(f);
    }
    tracing::debug!("compiling reduce module for '{}'", func_name);
    let ptx = cudarc::nvrtc::compile_ptx(REDUCE_CU)
        .map_err(|e| TallyError::CudaError(format!("PTX compile 'reduce': {}", e)))?;
    dev.load_ptx(ptx, "reduce", REDUCE_FUNCS)
        .map_err(|e| TallyError::CudaError(format!("load module 'reduce': {}", e)))?;
    dev.get_func("reduce", func_name)
        .ok_or_else(|| TallyError::CudaError(format!("func '{}' not found in 'reduce'", func_name)))
}

// ============================================================================
// Helpers
// ============================================================================

/// Extract (CudaDevice, device_idx, CudaSlice<u8>) from a GPU tensor's storage.
fn gpu_parts(t: &Tensor) -> Result<(Arc<CudaDevice>, usize, &CudaSlice<u8>)> {
    let not_on_gpu = || TallyError::CudaError("tensor not on GPU".into());
    let dev = t.storage_ref().cuda_device().ok_or_else(not_on_gpu)?;
    let idx = match t.device() {
        Device::Cuda(i) => i,
        Device::Cpu => return Err(not_on_gpu()),
    };
    let slice = t.storage_ref().as_cuda_slice().ok_or_else(not_on_gpu)?;
    Ok((dev, idx, slice))
}

fn require_f32(t: &Tensor) -> Result<()> {
    if t.dtype() != DType::F32 {
        return Err(TallyError::UnsupportedDType(t.dtype()));
    }
    require_dense(t)
}

/// GPU buffers are addressed from element zero; views never reach here.
fn require_dense(t: &Tensor) -> Result<()> {
    if t.is_contiguous() {
        Ok(())
    } else {
        Err(TallyError::CudaError("strided views are not supported on GPU".into()))
    }
}

/// Reinterpret a CudaSlice<u8> as a CudaView<f32> for kernel input.
/// Safety: the slice must hold valid f32 data with numel*4 <= slice.len().
unsafe fn as_f32_view(slice: &CudaSlice<u8>, numel: usize) -> Result<CudaView<'_, f32>> {
    slice
        .transmute(numel)
        .ok_or_else(|| TallyError::CudaError("f32 view exceeds buffer".into()))
}

/// Reinterpret a CudaSlice<u8> as a CudaViewMut<f32> for kernel output.
/// Safety: numel*4 <= slice.len().
unsafe fn as_f32_view_mut(slice: &mut CudaSlice<u8>, numel: usize) -> Result<CudaViewMut<'_, f32>> {
    slice
        .transmute_mut(numel)
        .ok_or_else(|| TallyError::CudaError("f32 view exceeds buffer".into()))
}

/// Allocate a zeroed byte buffer; zero-length requests still get one byte.
fn alloc_bytes(dev: &Arc<CudaDevice>, nbytes: usize) -> Result<CudaSlice<u8>> {
    dev.alloc_zeros::<u8>(nbytes.max(1))
        .map_err(|e| TallyError::CudaError(format!("alloc: {}", e)))
}

fn tensor_from_gpu(
    dev: Arc<CudaDevice>,
    dev_idx: usize,
    buffer: CudaSlice<u8>,
    dtype: DType,
    shape: &[usize],
) -> Tensor {
    let numel: usize = shape.iter().product();
    let storage = Storage::from_cuda(dev, buffer, dev_idx, dtype, numel);
    Tensor::from_storage(storage, shape)
}

fn grid_1d(n: usize, block: usize) -> LaunchConfig {
    LaunchConfig {
        grid_dim: (n.div_ceil(block) as u32, 1, 1),
        block_dim: (block as u32, 1, 1),
        shared_mem_bytes: 0,
    }
}

// ============================================================================
// Reductions
// ============================================================================

pub(crate) fn cuda_max(a: &Tensor) -> Result<Tensor> {
    require_f32(a)?;
    let (dev, idx, a_slice) = gpu_parts(a)?;
    let n = a.numel();

    let mut out = dev
        .htod_sync_copy(bytemuck::cast_slice::<f32, u8>(&[f32::NEG_INFINITY]))
        .map_err(|e| TallyError::CudaError(format!("H2D init: {}", e)))?;
    if n > 0 {
        let f = get_func(&dev, "reduce_max_f32")?;
        let cfg = grid_1d(n, BLOCK_SIZE);
        unsafe {
            let a_f32 = as_f32_view(a_slice, n)?;
            let mut out_f32 = as_f32_view_mut(&mut out, 1)?;
            f.launch(cfg, (&a_f32, &mut out_f32, n as u32))
                .map_err(|e| TallyError::CudaError(format!("launch reduce_max: {}", e)))?;
        }
    }
    Ok(tensor_from_gpu(dev, idx, out, DType::F32, &[]))
}

pub(crate) fn cuda_max_axis(
    a: &Tensor,
    (outer, axis_size, inner): (usize, usize, usize),
    out_shape: &[usize],
) -> Result<Tensor> {
    require_f32(a)?;
    let (dev, idx, a_slice) = gpu_parts(a)?;
    let out_numel = outer * inner;

    let mut out = alloc_bytes(&dev, out_numel * 4)?;
    if out_numel > 0 {
        let f = get_func(&dev, "reduce_max_axis_f32")?;
        let cfg = grid_1d(out_numel, BLOCK_SIZE);
        unsafe {
            let a_f32 = as_f32_view(a_slice, a.numel())?;
            let mut out_f32 = as_f32_view_mut(&mut out, out_numel)?;
            f.launch(
                cfg,
                (&a_f32, &mut out_f32, outer as u32, axis_size as u32, inner as u32),
            )
            .map_err(|e| TallyError::CudaError(format!("launch reduce_max_axis: {}", e)))?;
        }
    }
    Ok(tensor_from_gpu(dev, idx, out, DType::F32, out_shape))
}

// ============================================================================
// Gathers and copies
// ============================================================================

pub(crate) fn cuda_select(a: &Tensor, axis: usize, index: usize) -> Result<Tensor> {
    require_f32(a)?;
    let (dev, idx, a_slice) = gpu_parts(a)?;
    let (outer, axis_size, inner) = a.shape().split_at_axis(axis).ok_or(TallyError::InvalidAxis {
        axis,
        ndim: a.ndim(),
    })?;
    let out_shape = a.shape().without_axis(axis).ok_or(TallyError::InvalidAxis {
        axis,
        ndim: a.ndim(),
    })?;
    let out_numel = outer * inner;

    let mut out = alloc_bytes(&dev, out_numel * 4)?;
    if out_numel > 0 {
        let f = get_func(&dev, "select_axis_f32")?;
        let cfg = grid_1d(out_numel, BLOCK_SIZE);
        unsafe {
            let a_f32 = as_f32_view(a_slice, a.numel())?;
            let mut out_f32 = as_f32_view_mut(&mut out, out_numel)?;
            f.launch(
                cfg,
                (
                    &a_f32,
                    &mut out_f32,
                    outer as u32,
                    axis_size as u32,
                    inner as u32,
                    index as u32,
                ),
            )
            .map_err(|e| TallyError::CudaError(format!("launch select_axis: {}", e)))?;
        }
    }
    Ok(tensor_from_gpu(dev, idx, out, DType::F32, out_shape.dims()))
}

/// Concatenate contiguous GPU tensors with device-to-device copies.
pub(crate) fn cuda_cat(tensors: &[&Tensor], axis: usize, out_shape: &[usize]) -> Result<Tensor> {
    let first = tensors[0];
    let (dev, idx, _) = gpu_parts(first)?;
    let elem = first.dtype().element_size();
    let outer: usize = out_shape[..axis].iter().product();
    let inner: usize = out_shape[axis + 1..].iter().product();
    let total: usize = out_shape.iter().product();

    let mut out = alloc_bytes(&dev, total * elem)?;
    let mut dst = 0usize;
    for o in 0..outer {
        for t in tensors {
            require_dense(t)?;
            let (_, _, src) = gpu_parts(t)?;
            let chunk = t.shape().dims()[axis] * inner * elem;
            if chunk == 0 {
                continue;
            }
            let src_view = src.slice(o * chunk..(o + 1) * chunk);
            let mut dst_view = out.slice_mut(dst..dst + chunk);
            dev.dtod_copy(&src_view, &mut dst_view)
                .map_err(|e| TallyError::CudaError(format!("D2D copy: {}", e)))?;
            dst += chunk;
        }
    }
    debug_assert!(dst <= out.len());
    Ok(tensor_from_gpu(dev, idx, out, first.dtype(), out_shape))
}

/// GPU tensors are always materialized densely; a strided GPU view is a bug.
pub(crate) fn cuda_contiguous(a: &Tensor) -> Result<Tensor> {
    require_dense(a)?;
    Ok(a.clone())
}
