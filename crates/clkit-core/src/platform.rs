//! Platform enumeration and identity queries.

use std::fmt;
use std::ptr;

use log::debug;
use opencl3::types::{cl_platform_id, cl_uint};

use crate::device::{Device, DeviceType};
use crate::info::{
    self, CL_PLATFORM_EXTENSIONS, CL_PLATFORM_NAME, CL_PLATFORM_PROFILE, CL_PLATFORM_VENDOR,
    CL_PLATFORM_VERSION, PlatformQuery,
};
use crate::{Result, cl_check, ffi};

/// The ICD loader reports this instead of a zero count when no vendor
/// implementation is installed.
const CL_PLATFORM_NOT_FOUND_KHR: i32 = -1001;

/// An installed OpenCL implementation. Queried, never constructed or
/// released.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Platform(cl_platform_id);

impl Platform {
    /// Enumerates every installed platform. A host without one yields an
    /// empty vec, not an error.
    pub fn all() -> Result<Vec<Platform>> {
        let mut count: cl_uint = 0;
        let status = unsafe { ffi::clGetPlatformIDs(0, ptr::null_mut(), &mut count) };
        if status == CL_PLATFORM_NOT_FOUND_KHR {
            return Ok(Vec::new());
        }
        cl_check("clGetPlatformIDs", status)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ids: Vec<cl_platform_id> = vec![ptr::null_mut(); count as usize];
        let status = unsafe { ffi::clGetPlatformIDs(count, ids.as_mut_ptr(), ptr::null_mut()) };
        cl_check("clGetPlatformIDs", status)?;

        debug!("enumerated {count} OpenCL platform(s)");
        Ok(ids.into_iter().map(Platform).collect())
    }

    /// First installed platform, or [`crate::Error::NoPlatform`].
    pub fn first() -> Result<Platform> {
        Platform::all()?
            .into_iter()
            .next()
            .ok_or(crate::Error::NoPlatform)
    }

    pub fn name(&self) -> Result<String> {
        info::string_info(&PlatformQuery(self.0), CL_PLATFORM_NAME)
    }

    pub fn vendor(&self) -> Result<String> {
        info::string_info(&PlatformQuery(self.0), CL_PLATFORM_VENDOR)
    }

    pub fn profile(&self) -> Result<String> {
        info::string_info(&PlatformQuery(self.0), CL_PLATFORM_PROFILE)
    }

    pub fn version(&self) -> Result<String> {
        info::string_info(&PlatformQuery(self.0), CL_PLATFORM_VERSION)
    }

    pub fn extensions(&self) -> Result<String> {
        info::string_info(&PlatformQuery(self.0), CL_PLATFORM_EXTENSIONS)
    }

    /// Devices of the given type on this platform; empty when none match.
    pub fn devices(&self, kind: DeviceType) -> Result<Vec<Device>> {
        Device::list(*self, kind)
    }

    pub(crate) fn id(&self) -> cl_platform_id {
        self.0
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Platform").field(&self.0).finish()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[name:{}, vendor:{}, version:{}]",
            self.name().unwrap_or_default(),
            self.vendor().unwrap_or_default(),
            self.version().unwrap_or_default(),
        )
    }
}
