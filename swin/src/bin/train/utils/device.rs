use candle_core::Device;
use swin::{Error, Result};

/// Accelerator named by a `--device` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceRequest {
    /// Accepts `cpu`, `cuda`, `cuda:N`, `metal`, `metal:N` and bare CUDA ids
    /// such as `0` or `0,1`. Only the first of several ids is used.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim().to_lowercase();
        let invalid = || Error::Config(format!("invalid device '{}'", spec));

        let (kind, ordinal) = match spec.split_once(':') {
            Some((kind, ordinal)) => (kind, Some(ordinal)),
            None => (spec.as_str(), None),
        };
        let ordinal = match ordinal {
            Some(ordinal) => ordinal.parse::<usize>().map_err(|_| invalid())?,
            None => 0,
        };

        match kind {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(ordinal)),
            "metal" => Ok(Self::Metal(ordinal)),
            ids => {
                let first = ids.split(',').next().unwrap_or_default().trim();
                first.parse::<usize>().map(Self::Cuda).map_err(|_| invalid())
            }
        }
    }
}

/// Opens the requested device, falling back to the CPU when the accelerator
/// is unavailable or not compiled in.
pub fn get_device(spec: &str) -> Result<Device> {
    match DeviceRequest::parse(spec)? {
        DeviceRequest::Cpu => {}
        DeviceRequest::Cuda(ordinal) => {
            #[cfg(feature = "cuda")]
            match Device::new_cuda(ordinal) {
                Ok(device) => {
                    log::info!("Using CUDA device {}", ordinal);
                    return Ok(device);
                }
                Err(e) => log::warn!("CUDA device {} unavailable: {}", ordinal, e),
            }
            #[cfg(not(feature = "cuda"))]
            log::warn!("Built without CUDA support, ignoring cuda:{}", ordinal);
        }
        DeviceRequest::Metal(ordinal) => {
            #[cfg(feature = "metal")]
            match Device::new_metal(ordinal) {
                Ok(device) => {
                    log::info!("Using Metal device {}", ordinal);
                    return Ok(device);
                }
                Err(e) => log::warn!("Metal device {} unavailable: {}", ordinal, e),
            }
            #[cfg(not(feature = "metal"))]
            log::warn!("Built without Metal support, ignoring metal:{}", ordinal);
        }
    }

    log::info!("Using CPU device");
    Ok(Device::Cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_strings() {
        assert_eq!(DeviceRequest::parse("cpu").unwrap(), DeviceRequest::Cpu);
        assert_eq!(DeviceRequest::parse("CPU").unwrap(), DeviceRequest::Cpu);
        assert_eq!(DeviceRequest::parse("cuda").unwrap(), DeviceRequest::Cuda(0));
        assert_eq!(DeviceRequest::parse("cuda:1").unwrap(), DeviceRequest::Cuda(1));
        assert_eq!(DeviceRequest::parse("metal").unwrap(), DeviceRequest::Metal(0));
        assert_eq!(DeviceRequest::parse("0").unwrap(), DeviceRequest::Cuda(0));
        assert_eq!(DeviceRequest::parse("2,3").unwrap(), DeviceRequest::Cuda(2));
    }

    #[test]
    fn test_parse_rejects_unknown_devices() {
        assert!(DeviceRequest::parse("tpu").is_err());
        assert!(DeviceRequest::parse("cuda:x").is_err());
        assert!(DeviceRequest::parse("").is_err());
    }

    #[test]
    fn test_cpu_device() {
        assert!(get_device("cpu").unwrap().is_cpu());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_falls_back_to_cpu_without_support() {
        assert!(get_device("cuda:1").unwrap().is_cpu());
    }
}
