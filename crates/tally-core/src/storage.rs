use std::sync::Arc;

use crate::{DType, Device, Element, Result, TallyError};

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaDevice, CudaSlice, DeviceSlice};

/// Backing storage for tensor data.
///
/// Storage is reference-counted (`Arc`) so multiple tensors can share the same
/// underlying data (e.g., views from reshape/select).
#[derive(Debug, Clone)]
pub enum StorageData {
    /// CPU heap storage. Kept in `u64` words so every dtype can be viewed
    /// in place without alignment faults; `nbytes` is the logical length.
    Cpu { words: Vec<u64>, nbytes: usize },
    /// CUDA GPU storage with device handle and raw byte buffer.
    #[cfg(feature = "cuda")]
    Cuda {
        device: Arc<CudaDevice>,
        buffer: Arc<CudaSlice<u8>>,
        device_idx: usize,
    },
}

impl StorageData {
    fn cpu_from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        StorageData::Cpu {
            words,
            nbytes: bytes.len(),
        }
    }
}

/// Shared, reference-counted tensor storage.
#[derive(Debug, Clone)]
pub struct Storage {
    data: Arc<StorageData>,
    dtype: DType,
    device: Device,
    /// Number of logical elements (not bytes).
    numel: usize,
}

impl Storage {
    /// Allocate new zeroed CPU storage for `numel` elements of the given dtype.
    pub fn zeros(dtype: DType, numel: usize) -> Self {
        let nbytes = dtype.storage_bytes(numel);
        Self {
            data: Arc::new(StorageData::Cpu {
                words: vec![0u64; nbytes.div_ceil(8)],
                nbytes,
            }),
            dtype,
            device: Device::Cpu,
            numel,
        }
    }

    /// Create storage from raw bytes (CPU).
    pub fn from_bytes(dtype: DType, numel: usize, bytes: &[u8]) -> Result<Self> {
        let expected = dtype.storage_bytes(numel);
        if bytes.len() != expected {
            return Err(TallyError::StorageError(format!(
                "Expected {} bytes for {} elements of {}, got {}",
                expected,
                numel,
                dtype,
                bytes.len()
            )));
        }
        Ok(Self {
            data: Arc::new(StorageData::cpu_from_bytes(bytes)),
            dtype,
            device: Device::Cpu,
            numel,
        })
    }

    /// Create CPU storage from a slice of any element type.
    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        Self {
            data: Arc::new(StorageData::cpu_from_bytes(bytemuck::cast_slice(data))),
            dtype: T::DTYPE,
            device: Device::Cpu,
            numel: data.len(),
        }
    }

    /// Get the dtype of this storage.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Get the device of this storage.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Size in bytes.
    pub fn nbytes(&self) -> usize {
        match self.data.as_ref() {
            StorageData::Cpu { nbytes, .. } => *nbytes,
            #[cfg(feature = "cuda")]
            StorageData::Cuda { buffer, .. } => buffer.len(),
        }
    }

    /// Raw bytes of CPU storage. `None` for GPU storage; move it to the host
    /// with `to_cpu()` first.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.data.as_ref() {
            StorageData::Cpu { words, nbytes } => {
                Some(&bytemuck::cast_slice::<u64, u8>(words)[..*nbytes])
            }
            #[cfg(feature = "cuda")]
            StorageData::Cuda { .. } => None,
        }
    }

    /// Interpret CPU storage as a slice of `T`.
    /// Returns None if the dtype differs from `T` or the data lives on a GPU.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        if self.dtype != T::DTYPE {
            return None;
        }
        self.as_bytes().map(bytemuck::cast_slice)
    }

    /// Whether this storage is uniquely owned (no other Arc references).
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.data) == 1
    }

    /// Whether this storage is on CPU.
    pub fn is_cpu(&self) -> bool {
        self.device.is_cpu()
    }

    /// Whether this storage is on a CUDA device.
    pub fn is_cuda(&self) -> bool {
        self.device.is_cuda()
    }

    /// Create GPU storage from host bytes (H2D copy).
    #[cfg(feature = "cuda")]
    pub fn to_cuda(&self, device_idx: usize) -> Result<Self> {
        if let Device::Cuda(idx) = self.device {
            if idx == device_idx {
                return Ok(self.clone());
            }
        }
        let host = self.to_cpu()?;
        let host_bytes = host
            .as_bytes()
            .ok_or_else(|| TallyError::StorageError("expected host bytes after D2H copy".into()))?;
        let cuda_dev = crate::ops::cuda_ops::device(device_idx)?;
        // Zero-byte device allocations are rejected by the driver.
        let upload: &[u8] = if host_bytes.is_empty() { &[0u8] } else { host_bytes };
        let gpu_buf = cuda_dev
            .htod_sync_copy(upload)
            .map_err(|e| TallyError::CudaError(format!("H2D copy: {}", e)))?;
        Ok(Self::from_cuda(cuda_dev, gpu_buf, device_idx, self.dtype, self.numel))
    }

    /// Copy GPU storage back to CPU (D2H copy).
    #[cfg(feature = "cuda")]
    pub fn to_cpu(&self) -> Result<Self> {
        match self.data.as_ref() {
            StorageData::Cpu { .. } => Ok(self.clone()),
            StorageData::Cuda { device, buffer, .. } => {
                let host_data: Vec<u8> = device
                    .dtoh_sync_copy(buffer.as_ref())
                    .map_err(|e| TallyError::CudaError(format!("D2H copy: {}", e)))?;
                let nbytes = self.dtype.storage_bytes(self.numel).min(host_data.len());
                Ok(Self {
                    data: Arc::new(StorageData::cpu_from_bytes(&host_data[..nbytes])),
                    dtype: self.dtype,
                    device: Device::Cpu,
                    numel: self.numel,
                })
            }
        }
    }

    /// Get the underlying CudaSlice for kernel launches.
    /// Returns None if not on GPU.
    #[cfg(feature = "cuda")]
    pub fn as_cuda_slice(&self) -> Option<&CudaSlice<u8>> {
        match self.data.as_ref() {
            StorageData::Cuda { buffer, .. } => Some(buffer.as_ref()),
            _ => None,
        }
    }

    /// Get the CudaDevice handle. Returns None if not on GPU.
    #[cfg(feature = "cuda")]
    pub fn cuda_device(&self) -> Option<Arc<CudaDevice>> {
        match self.data.as_ref() {
            StorageData::Cuda { device, .. } => Some(Arc::clone(device)),
            _ => None,
        }
    }

    /// Get the raw StorageData reference (for dispatch).
    pub fn data(&self) -> &StorageData {
        self.data.as_ref()
    }

    /// Create Storage directly from a CUDA buffer (used by kernel dispatch).
    #[cfg(feature = "cuda")]
    pub fn from_cuda(
        device: Arc<CudaDevice>,
        buffer: CudaSlice<u8>,
        device_idx: usize,
        dtype: DType,
        numel: usize,
    ) -> Self {
        Self {
            data: Arc::new(StorageData::Cuda {
                device,
                buffer: Arc::new(buffer),
                device_idx,
            }),
            dtype,
            device: Device::Cuda(device_idx),
            numel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let s = Storage::zeros(DType::F32, 10);
        assert_eq!(s.dtype(), DType::F32);
        assert_eq!(s.device(), Device::Cpu);
        assert_eq!(s.numel(), 10);
        assert_eq!(s.nbytes(), 40);
        assert!(s.as_bytes().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_slice() {
        let s = Storage::from_slice(&[1.0f32, 2.0, 3.0]);
        assert_eq!(s.numel(), 3);
        assert_eq!(s.nbytes(), 12);
        assert_eq!(s.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0]);

        let s = Storage::from_slice(&[7i64, -2, 9]);
        assert_eq!(s.dtype(), DType::I64);
        assert_eq!(s.as_slice::<i64>().unwrap(), &[7, -2, 9]);
    }

    #[test]
    fn test_as_slice_dtype_checked() {
        let s = Storage::from_slice(&[1i32, 2, 3]);
        assert!(s.as_slice::<i64>().is_none());
        assert!(s.as_slice::<f32>().is_none());
        assert_eq!(s.as_slice::<i32>().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_odd_byte_lengths() {
        // 3 x i32 = 12 bytes, not a multiple of the 8-byte word
        let s = Storage::from_slice(&[i32::MAX, 0, i32::MIN]);
        assert_eq!(s.as_bytes().unwrap().len(), 12);
        assert_eq!(s.as_slice::<i32>().unwrap(), &[i32::MAX, 0, i32::MIN]);
    }

    #[test]
    fn test_shared_clone() {
        let s1 = Storage::from_slice(&[1.0f64, 2.0]);
        let s2 = s1.clone();
        assert!(!s1.is_unique());
        assert_eq!(s2.as_slice::<f64>().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_from_bytes_validation() {
        let result = Storage::from_bytes(DType::F32, 3, &[0u8; 11]);
        assert!(result.is_err());

        let result = Storage::from_bytes(DType::F32, 3, &[0u8; 12]);
        assert!(result.is_ok());
    }
}
