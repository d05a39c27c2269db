use std::fmt;
use std::str::FromStr;

use crate::Result;
#[cfg(not(feature = "cuda"))]
use crate::TallyError;

/// Compute device for tensor storage and operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host memory; large reductions and sorts fan out over rayon.
    #[default]
    Cpu,
    /// CUDA GPU with device index
    Cuda(usize),
}

impl Device {
    /// Whether this is a CPU device.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }

    /// Whether this is a CUDA device.
    pub fn is_cuda(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }

    /// Get the CUDA device index, if applicable.
    pub fn cuda_index(&self) -> Option<usize> {
        match self {
            Device::Cuda(idx) => Some(*idx),
            _ => None,
        }
    }

    /// Block until all work queued on this device has finished.
    ///
    /// A no-op on CPU, where every op completes before returning.
    pub fn synchronize(&self) -> Result<()> {
        match self {
            Device::Cpu => Ok(()),
            #[cfg(feature = "cuda")]
            Device::Cuda(idx) => crate::ops::cuda_ops::synchronize(*idx),
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => Err(TallyError::UnsupportedDevice {
                op: "synchronize",
                device: *self,
            }),
        }
    }

    /// Number of CUDA devices reachable from this process. Always 0 when
    /// built without the `cuda` feature.
    pub fn cuda_device_count() -> usize {
        #[cfg(feature = "cuda")]
        {
            crate::ops::cuda_ops::device_count()
        }
        #[cfg(not(feature = "cuda"))]
        {
            0
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{idx}"),
        }
    }
}

/// Error returned when a device string is not `cpu`, `cuda` or `cuda:N`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device '{0}' (expected cpu, cuda or cuda:N)")]
pub struct ParseDeviceError(pub String);

impl FromStr for Device {
    type Err = ParseDeviceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|idx| idx.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| ParseDeviceError(s.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_properties() {
        assert!(Device::Cpu.is_cpu());
        assert!(!Device::Cpu.is_cuda());
        assert!(Device::Cuda(0).is_cuda());
        assert_eq!(Device::Cuda(1).cuda_index(), Some(1));
        assert_eq!(Device::Cpu.cuda_index(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Device::Cpu), "cpu");
        assert_eq!(format!("{}", Device::Cuda(0)), "cuda:0");
    }

    #[test]
    fn test_default() {
        assert_eq!(Device::default(), Device::Cpu);
    }

    #[test]
    fn test_parse() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:3".parse::<Device>().unwrap(), Device::Cuda(3));
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
    }

    #[test]
    fn test_cpu_synchronize() {
        assert!(Device::Cpu.synchronize().is_ok());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_no_cuda_devices_without_feature() {
        assert_eq!(Device::cuda_device_count(), 0);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_synchronize_without_feature() {
        assert!(Device::Cuda(0).synchronize().is_err());
    }
}
