//! Device enumeration by type filter and device identity queries.

use std::fmt;
use std::ptr;

use log::debug;
use opencl3::device::{
    CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU,
};
use opencl3::types::{cl_device_id, cl_device_type, cl_uint, cl_ulong};

use crate::info::{
    self, CL_DEVICE_EXTENSIONS, CL_DEVICE_GLOBAL_MEM_SIZE, CL_DEVICE_MAX_COMPUTE_UNITS,
    CL_DEVICE_MAX_WORK_GROUP_SIZE, CL_DEVICE_MEM_BASE_ADDR_ALIGN, CL_DEVICE_NAME,
    CL_DEVICE_PROFILE, CL_DEVICE_TYPE, CL_DEVICE_VENDOR, CL_DEVICE_VERSION, DeviceQuery,
};
use crate::platform::Platform;
use crate::{Result, cl_check, ffi};

const CL_DEVICE_NOT_FOUND: i32 = -1;

/// Type filter for device enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Cpu,
    Gpu,
    Accelerator,
    All,
}

impl DeviceType {
    pub(crate) fn raw(self) -> cl_device_type {
        match self {
            DeviceType::Cpu => CL_DEVICE_TYPE_CPU,
            DeviceType::Gpu => CL_DEVICE_TYPE_GPU,
            DeviceType::Accelerator => CL_DEVICE_TYPE_ACCELERATOR,
            DeviceType::All => CL_DEVICE_TYPE_ALL,
        }
    }

    fn from_raw(raw: cl_device_type) -> DeviceType {
        if raw & CL_DEVICE_TYPE_GPU != 0 {
            DeviceType::Gpu
        } else if raw & CL_DEVICE_TYPE_CPU != 0 {
            DeviceType::Cpu
        } else if raw & CL_DEVICE_TYPE_ACCELERATOR != 0 {
            DeviceType::Accelerator
        } else {
            DeviceType::All
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviceType::Cpu => "CPU",
            DeviceType::Gpu => "GPU",
            DeviceType::Accelerator => "accelerator",
            DeviceType::All => "any",
        };
        f.write_str(label)
    }
}

/// A compute unit exposed by a platform. Process-wide lifetime, no release.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Device(cl_device_id);

impl Device {
    /// Enumerates devices of `kind` on `platform`. Zero matches is a normal
    /// outcome and yields an empty vec; the driver's `CL_DEVICE_NOT_FOUND`
    /// status is folded into it.
    pub fn list(platform: Platform, kind: DeviceType) -> Result<Vec<Device>> {
        let mut count: cl_uint = 0;
        let status = unsafe {
            ffi::clGetDeviceIDs(platform.id(), kind.raw(), 0, ptr::null_mut(), &mut count)
        };
        if status == CL_DEVICE_NOT_FOUND {
            debug!("no {kind} device on platform");
            return Ok(Vec::new());
        }
        cl_check("clGetDeviceIDs", status)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ids: Vec<cl_device_id> = vec![ptr::null_mut(); count as usize];
        let status = unsafe {
            ffi::clGetDeviceIDs(
                platform.id(),
                kind.raw(),
                count,
                ids.as_mut_ptr(),
                ptr::null_mut(),
            )
        };
        cl_check("clGetDeviceIDs", status)?;

        Ok(ids.into_iter().map(Device).collect())
    }

    pub fn name(&self) -> Result<String> {
        info::string_info(&DeviceQuery(self.0), CL_DEVICE_NAME)
    }

    pub fn vendor(&self) -> Result<String> {
        info::string_info(&DeviceQuery(self.0), CL_DEVICE_VENDOR)
    }

    pub fn version(&self) -> Result<String> {
        info::string_info(&DeviceQuery(self.0), CL_DEVICE_VERSION)
    }

    pub fn profile(&self) -> Result<String> {
        info::string_info(&DeviceQuery(self.0), CL_DEVICE_PROFILE)
    }

    pub fn extensions(&self) -> Result<String> {
        info::string_info(&DeviceQuery(self.0), CL_DEVICE_EXTENSIONS)
    }

    pub fn device_type(&self) -> Result<DeviceType> {
        let raw: cl_device_type = info::scalar_info(&DeviceQuery(self.0), CL_DEVICE_TYPE)?;
        Ok(DeviceType::from_raw(raw))
    }

    pub fn max_compute_units(&self) -> Result<u32> {
        info::scalar_info(&DeviceQuery(self.0), CL_DEVICE_MAX_COMPUTE_UNITS)
    }

    pub fn max_work_group_size(&self) -> Result<usize> {
        info::scalar_info(&DeviceQuery(self.0), CL_DEVICE_MAX_WORK_GROUP_SIZE)
    }

    pub fn global_mem_size(&self) -> Result<u64> {
        let bytes: cl_ulong = info::scalar_info(&DeviceQuery(self.0), CL_DEVICE_GLOBAL_MEM_SIZE)?;
        Ok(bytes)
    }

    /// Minimum sub-buffer origin alignment, in bits.
    pub fn mem_base_addr_align(&self) -> Result<u32> {
        info::scalar_info(&DeviceQuery(self.0), CL_DEVICE_MEM_BASE_ADDR_ALIGN)
    }

    pub(crate) fn id(&self) -> cl_device_id {
        self.0
    }

    pub(crate) fn from_id(id: cl_device_id) -> Device {
        Device(id)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Device").field(&self.0).finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[name:{}, vendor:{}, type:{}]",
            self.name().unwrap_or_default(),
            self.vendor().unwrap_or_default(),
            self.device_type().unwrap_or(DeviceType::All),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_filter_maps_to_driver_bits() {
        assert_eq!(DeviceType::Cpu.raw(), CL_DEVICE_TYPE_CPU);
        assert_eq!(DeviceType::Gpu.raw(), CL_DEVICE_TYPE_GPU);
        assert_eq!(DeviceType::All.raw(), CL_DEVICE_TYPE_ALL);
    }

    #[test]
    fn type_roundtrip_prefers_specific_bits() {
        assert_eq!(DeviceType::from_raw(CL_DEVICE_TYPE_GPU), DeviceType::Gpu);
        assert_eq!(DeviceType::from_raw(CL_DEVICE_TYPE_CPU), DeviceType::Cpu);
        assert_eq!(
            DeviceType::from_raw(CL_DEVICE_TYPE_ACCELERATOR),
            DeviceType::Accelerator
        );
    }
}
