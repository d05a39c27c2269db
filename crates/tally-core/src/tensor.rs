use std::fmt;

use rand::Rng;
use smallvec::SmallVec;

use crate::dtype::{DType, Element};
use crate::device::Device;
use crate::error::TallyError;
use crate::shape::Shape;
use crate::storage::Storage;
use crate::{with_dtype, Result};

/// A multi-dimensional array, the fundamental data structure in tally.
///
/// Tensors support:
/// - F32, F64, I32 and I64 elements
/// - Zero-copy views (reshape and select share storage)
/// - CPU and CUDA devices
///
/// # Examples
///
/// ```
/// use tally_core::Tensor;
///
/// // Create from f32 data
/// let t = Tensor::from_f32(&[1.0, 5.0, 3.0, 2.0], &[2, 2]);
/// assert_eq!(t.shape().dims(), &[2, 2]);
/// assert_eq!(t.numel(), 4);
///
/// // Reshape (zero-copy view)
/// let flat = t.reshape(&[4]).unwrap();
/// assert_eq!(flat.shape().dims(), &[4]);
/// ```
#[derive(Clone)]
pub struct Tensor {
    pub(crate) storage: Storage,
    pub(crate) shape: Shape,
    pub(crate) strides: SmallVec<[usize; 4]>,
    pub(crate) offset: usize,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a tensor from a slice of any element type with the given shape.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        assert_eq!(
            s.numel(),
            data.len(),
            "Shape {:?} requires {} elements, got {}",
            shape,
            s.numel(),
            data.len()
        );
        Self::from_storage(Storage::from_slice(data), shape)
    }

    /// Create a tensor from f32 data with the given shape.
    pub fn from_f32(data: &[f32], shape: &[usize]) -> Self {
        Self::from_slice(data, shape)
    }

    /// Create a tensor from i64 data with the given shape.
    pub fn from_i64(data: &[i64], shape: &[usize]) -> Self {
        Self::from_slice(data, shape)
    }

    /// Create a tensor of zeros with the given shape and dtype.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let numel = Shape::new(shape).numel();
        Self::from_storage(Storage::zeros(dtype, numel), shape)
    }

    /// Create a 0-D tensor holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self::from_storage(Storage::from_slice(&[value]), &[])
    }

    /// Create an f32 tensor uniformly distributed in `[low, high)`.
    pub fn rand_uniform(shape: &[usize], low: f32, high: f32) -> Self {
        Self::rand_uniform_with(&mut rand::thread_rng(), shape, low, high)
    }

    /// Like [`Tensor::rand_uniform`], drawing from the given generator.
    ///
    /// # Panics
    /// Panics if `low >= high`.
    pub fn rand_uniform_with<R: Rng + ?Sized>(
        rng: &mut R,
        shape: &[usize],
        low: f32,
        high: f32,
    ) -> Self {
        assert!(low < high, "rand_uniform: empty range [{}, {})", low, high);
        let numel = Shape::new(shape).numel();
        let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
        Self::from_f32(&data, shape)
    }

    /// Create an i64 tensor of integers uniformly drawn from `[low, high)`.
    pub fn randint(shape: &[usize], low: i64, high: i64) -> Self {
        Self::randint_with(&mut rand::thread_rng(), shape, low, high)
    }

    /// Like [`Tensor::randint`], drawing from the given generator.
    ///
    /// # Panics
    /// Panics if `low >= high`.
    pub fn randint_with<R: Rng + ?Sized>(
        rng: &mut R,
        shape: &[usize],
        low: i64,
        high: i64,
    ) -> Self {
        assert!(low < high, "randint: empty range [{}, {})", low, high);
        let numel = Shape::new(shape).numel();
        let data: Vec<i64> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
        Self::from_i64(&data, shape)
    }

    /// Create a tensor from pre-built Storage and shape.
    pub fn from_storage(storage: Storage, shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        let strides = s.contiguous_strides();
        Self {
            storage,
            shape: s,
            strides,
            offset: 0,
        }
    }

    /// Get a reference to the underlying storage (for CUDA dispatch).
    pub fn storage_ref(&self) -> &Storage {
        &self.storage
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Shape of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Device.
    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Strides (in elements, not bytes).
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Offset of the first element in storage (in elements).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether this tensor covers its whole storage in row-major order.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0
            && self.storage.numel() == self.numel()
            && self.strides == self.shape.contiguous_strides()
    }

    // =========================================================================
    // Data access
    // =========================================================================

    /// Get the underlying data as a slice (contiguous CPU tensors only).
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        if !self.is_contiguous() {
            return None;
        }
        self.storage.as_slice()
    }

    /// Get the underlying f32 data as a slice (contiguous CPU tensors only).
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        self.as_slice()
    }

    /// Get the underlying i64 data as a slice (contiguous CPU tensors only).
    pub fn as_i64_slice(&self) -> Option<&[i64]> {
        self.as_slice()
    }

    /// Get a single element by flat (logical, row-major) index. CPU only.
    pub fn get<T: Element>(&self, flat_index: usize) -> Option<T> {
        let slice = self.storage.as_slice::<T>()?;
        let physical = self.flat_to_physical(flat_index)?;
        slice.get(physical).copied()
    }

    /// Copy the elements into a host `Vec`, transferring from the device
    /// and compacting views as needed.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.dtype() != T::DTYPE {
            return Err(TallyError::DTypeMismatch {
                expected: T::DTYPE,
                got: self.dtype(),
            });
        }
        let host = self.cpu()?.contiguous()?;
        host.as_slice::<T>()
            .map(<[T]>::to_vec)
            .ok_or_else(|| TallyError::StorageError("to_vec: host copy is not contiguous".into()))
    }

    /// Convert a logical row-major index to a physical storage index.
    fn flat_to_physical(&self, flat_index: usize) -> Option<usize> {
        if self.shape.is_scalar() {
            return if flat_index == 0 {
                Some(self.offset)
            } else {
                None
            };
        }

        if flat_index >= self.numel() {
            return None;
        }

        let mut remaining = flat_index;
        let mut physical = self.offset;
        let contiguous_strides = self.shape.contiguous_strides();

        for (i, &cs) in contiguous_strides.iter().enumerate() {
            let idx = remaining / cs;
            remaining %= cs;
            physical += idx * self.strides[i];
        }

        Some(physical)
    }

    /// Ensure the tensor can be read on the host, naming `op` in the error.
    pub(crate) fn require_cpu(&self, op: &'static str) -> Result<()> {
        if self.device().is_cpu() {
            Ok(())
        } else {
            Err(TallyError::UnsupportedDevice {
                op,
                device: self.device(),
            })
        }
    }

    /// Borrow the host data of a contiguous CPU tensor, with errors naming `op`.
    pub(crate) fn host_slice<T: Element>(&self, op: &'static str) -> Result<&[T]> {
        self.require_cpu(op)?;
        if self.dtype() != T::DTYPE {
            return Err(TallyError::DTypeMismatch {
                expected: T::DTYPE,
                got: self.dtype(),
            });
        }
        self.as_slice::<T>().ok_or_else(|| {
            TallyError::StorageError(format!("{op}: tensor is not contiguous"))
        })
    }

    // =========================================================================
    // Shape operations (zero-copy views)
    // =========================================================================

    /// Reshape the tensor (zero-copy; the tensor must be contiguous).
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Tensor> {
        let resolved = self.shape.resolve_reshape(new_shape).ok_or_else(|| {
            TallyError::InvalidReshape {
                numel: self.numel(),
                shape: new_shape.to_vec(),
            }
        })?;

        if !self.is_contiguous() {
            return Err(TallyError::StorageError(
                "Cannot reshape non-contiguous tensor (call .contiguous() first)".into(),
            ));
        }

        let strides = resolved.contiguous_strides();
        Ok(Tensor {
            storage: self.storage.clone(), // Arc clone, shared data
            shape: resolved,
            strides,
            offset: self.offset,
        })
    }

    // =========================================================================
    // Device transfer
    // =========================================================================

    /// Whether this tensor is on CPU.
    pub fn is_cpu(&self) -> bool {
        self.storage.is_cpu()
    }

    /// Whether this tensor is on a CUDA device.
    pub fn is_cuda(&self) -> bool {
        self.storage.is_cuda()
    }

    /// Move tensor to the specified device. No-op if already there.
    ///
    /// Without the `cuda` feature any CUDA target fails with
    /// [`TallyError::UnsupportedDevice`].
    pub fn to(&self, device: Device) -> Result<Tensor> {
        if self.device() == device {
            return Ok(self.clone());
        }
        match device {
            Device::Cpu => self.to_host(),
            Device::Cuda(idx) => self.to_cuda_device(idx),
        }
    }

    /// Move tensor to CUDA device (convenience for `.to(Device::Cuda(idx))`).
    pub fn cuda(&self, device_idx: usize) -> Result<Tensor> {
        self.to(Device::Cuda(device_idx))
    }

    /// Move tensor to CPU (convenience for `.to(Device::Cpu)`).
    pub fn cpu(&self) -> Result<Tensor> {
        self.to(Device::Cpu)
    }

    #[cfg(feature = "cuda")]
    fn to_host(&self) -> Result<Tensor> {
        Ok(Tensor {
            storage: self.storage.to_cpu()?,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        })
    }

    #[cfg(not(feature = "cuda"))]
    fn to_host(&self) -> Result<Tensor> {
        // Only CPU storage can exist without the cuda feature.
        Ok(self.clone())
    }

    #[cfg(feature = "cuda")]
    fn to_cuda_device(&self, idx: usize) -> Result<Tensor> {
        // Must be contiguous before transfer
        let cont = self.cpu()?.contiguous()?;
        let storage = cont.storage.to_cuda(idx)?;
        Ok(Tensor::from_storage(storage, cont.shape.dims()))
    }

    #[cfg(not(feature = "cuda"))]
    fn to_cuda_device(&self, idx: usize) -> Result<Tensor> {
        Err(TallyError::UnsupportedDevice {
            op: "to",
            device: Device::Cuda(idx),
        })
    }

    /// Return a contiguous copy of this tensor if it isn't already contiguous.
    pub fn contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }

        #[cfg(feature = "cuda")]
        {
            if self.is_cuda() {
                return crate::ops::cuda_ops::cuda_contiguous(self);
            }
        }

        with_dtype!(self.dtype(), T => self.gather_contiguous::<T>())
    }

    fn gather_contiguous<T: Element>(&self) -> Result<Tensor> {
        self.require_cpu("contiguous")?;
        let data = (0..self.numel())
            .map(|i| self.get::<T>(i))
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| {
                TallyError::StorageError("contiguous: index out of bounds during copy".into())
            })?;
        Ok(Tensor::from_slice(&data, self.shape.dims()))
    }
}

fn render<T: Element>(data: &[T]) -> String {
    if data.len() <= 20 {
        format!("{:?}", data)
    } else {
        format!("[{}, {}, ..., {}]", data[0], data[1], data[data.len() - 1])
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, device={}, contiguous={})",
            self.shape,
            self.dtype(),
            self.device(),
            self.is_contiguous(),
        )
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = with_dtype!(self.dtype(), T => self.as_slice::<T>().map(render));
        match rendered {
            Some(data) => write!(
                f,
                "tensor({}, shape={}, dtype={})",
                data,
                self.shape,
                self.dtype()
            ),
            None => write!(
                f,
                "tensor(shape={}, dtype={}, device={})",
                self.shape,
                self.dtype(),
                self.device()
            ),
        }
    }
}
