use candle_core::Device;
use serde::Serialize;
use tracing::info;

use crate::error::Result;

/// Pick the compute device: an accelerator when one is compiled in and
/// reachable, the CPU otherwise.
pub fn get_device(force_cpu: bool) -> Result<Device> {
    if force_cpu {
        info!("using CPU device");
        return Ok(Device::Cpu);
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("using CUDA device");
                return Ok(device);
            }
            Err(e) => {
                tracing::warn!("CUDA not available: {}, falling back to CPU", e);
            }
        }
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("using Metal device");
                return Ok(device);
            }
            Err(e) => {
                tracing::warn!("Metal not available: {}, falling back to CPU", e);
            }
        }
    }

    info!("using CPU device");
    Ok(Device::Cpu)
}

pub fn device_label(device: &Device) -> String {
    match device {
        Device::Cpu => "CPU".to_string(),
        Device::Cuda(_) => "CUDA".to_string(),
        Device::Metal(_) => "Metal".to_string(),
    }
}

/// Device summary reported by `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub kind: String,
    pub gpu_available: bool,
}

pub fn describe_device(device: &Device) -> DeviceInfo {
    DeviceInfo {
        kind: device_label(device),
        gpu_available: !matches!(device, Device::Cpu),
    }
}
