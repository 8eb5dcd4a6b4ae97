//! The size-probe/fill convention behind every `clGet*Info` accessor.
//!
//! A [`InfoQuery`] source wraps exactly one driver entry point. String
//! selectors cost two driver calls (probe the byte length, then fill an
//! owned buffer); fixed-size selectors cost one. Public accessors on the
//! handle types pair each selector constant with exactly one result shape,
//! so a string selector can never be read into a scalar slot.

use std::ffi::c_void;
use std::ptr;

use bytemuck::Pod;
use opencl3::types::{cl_context, cl_device_id, cl_kernel, cl_mem, cl_platform_id, cl_program, cl_uint};

use crate::{Error, Result, ffi};

// Selector values from the Khronos cl.h registry.
pub(crate) const CL_PLATFORM_PROFILE: cl_uint = 0x0900;
pub(crate) const CL_PLATFORM_VERSION: cl_uint = 0x0901;
pub(crate) const CL_PLATFORM_NAME: cl_uint = 0x0902;
pub(crate) const CL_PLATFORM_VENDOR: cl_uint = 0x0903;
pub(crate) const CL_PLATFORM_EXTENSIONS: cl_uint = 0x0904;

pub(crate) const CL_DEVICE_TYPE: cl_uint = 0x1000;
pub(crate) const CL_DEVICE_MAX_COMPUTE_UNITS: cl_uint = 0x1002;
pub(crate) const CL_DEVICE_MAX_WORK_GROUP_SIZE: cl_uint = 0x1004;
pub(crate) const CL_DEVICE_MEM_BASE_ADDR_ALIGN: cl_uint = 0x1019;
pub(crate) const CL_DEVICE_GLOBAL_MEM_SIZE: cl_uint = 0x101F;
pub(crate) const CL_DEVICE_NAME: cl_uint = 0x102B;
pub(crate) const CL_DEVICE_VENDOR: cl_uint = 0x102C;
pub(crate) const CL_DEVICE_PROFILE: cl_uint = 0x102E;
pub(crate) const CL_DEVICE_VERSION: cl_uint = 0x102F;
pub(crate) const CL_DEVICE_EXTENSIONS: cl_uint = 0x1030;

pub(crate) const CL_CONTEXT_DEVICES: cl_uint = 0x1081;
pub(crate) const CL_CONTEXT_NUM_DEVICES: cl_uint = 0x1083;

pub(crate) const CL_MEM_TYPE: cl_uint = 0x1100;
pub(crate) const CL_MEM_SIZE: cl_uint = 0x1102;
pub(crate) const CL_MEM_OFFSET: cl_uint = 0x1108;

pub(crate) const CL_KERNEL_FUNCTION_NAME: cl_uint = 0x1190;
pub(crate) const CL_KERNEL_NUM_ARGS: cl_uint = 0x1191;

pub(crate) const CL_PROGRAM_BUILD_LOG: cl_uint = 0x1183;

/// One wrapped `clGet*Info` entry point.
///
/// `value == None` probes the required byte size; `Some(buf)` fills `buf`.
pub(crate) trait InfoQuery {
    const OP: &'static str;

    fn query(&self, selector: cl_uint, value: Option<&mut [u8]>) -> std::result::Result<usize, i32>;
}

/// Variable-length text: probe, allocate, fill, strip the trailing NUL.
pub(crate) fn string_info<Q: InfoQuery>(source: &Q, selector: cl_uint) -> Result<String> {
    let size = source
        .query(selector, None)
        .map_err(|code| Error::Api { op: Q::OP, code })?;
    if size == 0 {
        return Ok(String::new());
    }
    let mut raw = vec![0u8; size];
    source
        .query(selector, Some(&mut raw))
        .map_err(|code| Error::Api { op: Q::OP, code })?;
    while raw.last() == Some(&0) {
        raw.pop();
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Fixed-size result in a single call.
pub(crate) fn scalar_info<Q: InfoQuery, T: Pod>(source: &Q, selector: cl_uint) -> Result<T> {
    let mut value = T::zeroed();
    source
        .query(selector, Some(bytemuck::bytes_of_mut(&mut value)))
        .map_err(|code| Error::Api { op: Q::OP, code })?;
    Ok(value)
}

/// Handle lists (e.g. the devices of a context): probe, fill, reinterpret.
pub(crate) fn device_list_info<Q: InfoQuery>(
    source: &Q,
    selector: cl_uint,
) -> Result<Vec<cl_device_id>> {
    let size = source
        .query(selector, None)
        .map_err(|code| Error::Api { op: Q::OP, code })?;
    let count = size / std::mem::size_of::<cl_device_id>();
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut ids: Vec<cl_device_id> = vec![ptr::null_mut(); count];
    let bytes = unsafe { std::slice::from_raw_parts_mut(ids.as_mut_ptr().cast::<u8>(), size) };
    source
        .query(selector, Some(bytes))
        .map_err(|code| Error::Api { op: Q::OP, code })?;
    Ok(ids)
}

macro_rules! info_source {
    ($name:ident, $handle:ty, $raw:path, $op:literal) => {
        pub(crate) struct $name(pub(crate) $handle);

        impl InfoQuery for $name {
            const OP: &'static str = $op;

            fn query(
                &self,
                selector: cl_uint,
                value: Option<&mut [u8]>,
            ) -> std::result::Result<usize, i32> {
                let mut size = 0usize;
                let status = match value {
                    None => unsafe { $raw(self.0, selector, 0, ptr::null_mut(), &mut size) },
                    Some(buf) => {
                        size = buf.len();
                        unsafe {
                            $raw(
                                self.0,
                                selector,
                                buf.len(),
                                buf.as_mut_ptr().cast::<c_void>(),
                                ptr::null_mut(),
                            )
                        }
                    }
                };
                if status == 0 { Ok(size) } else { Err(status) }
            }
        }
    };
}

info_source!(PlatformQuery, cl_platform_id, ffi::clGetPlatformInfo, "clGetPlatformInfo");
info_source!(DeviceQuery, cl_device_id, ffi::clGetDeviceInfo, "clGetDeviceInfo");
info_source!(ContextQuery, cl_context, ffi::clGetContextInfo, "clGetContextInfo");
info_source!(MemQuery, cl_mem, ffi::clGetMemObjectInfo, "clGetMemObjectInfo");
info_source!(KernelQuery, cl_kernel, ffi::clGetKernelInfo, "clGetKernelInfo");

/// Build results are keyed by (program, device).
pub(crate) struct BuildQuery {
    pub(crate) program: cl_program,
    pub(crate) device: cl_device_id,
}

impl InfoQuery for BuildQuery {
    const OP: &'static str = "clGetProgramBuildInfo";

    fn query(&self, selector: cl_uint, value: Option<&mut [u8]>) -> std::result::Result<usize, i32> {
        let mut size = 0usize;
        let status = match value {
            None => unsafe {
                ffi::clGetProgramBuildInfo(
                    self.program,
                    self.device,
                    selector,
                    0,
                    ptr::null_mut(),
                    &mut size,
                )
            },
            Some(buf) => {
                size = buf.len();
                unsafe {
                    ffi::clGetProgramBuildInfo(
                        self.program,
                        self.device,
                        selector,
                        buf.len(),
                        buf.as_mut_ptr().cast::<c_void>(),
                        ptr::null_mut(),
                    )
                }
            }
        };
        if status == 0 { Ok(size) } else { Err(status) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Scripted source: serves a fixed payload and counts raw calls.
    struct FakeQuery {
        payload: &'static [u8],
        calls: Cell<usize>,
        fail_probe: bool,
        fail_fill: bool,
    }

    impl FakeQuery {
        fn serving(payload: &'static [u8]) -> Self {
            Self {
                payload,
                calls: Cell::new(0),
                fail_probe: false,
                fail_fill: false,
            }
        }
    }

    impl InfoQuery for FakeQuery {
        const OP: &'static str = "clGetFakeInfo";

        fn query(
            &self,
            _selector: cl_uint,
            value: Option<&mut [u8]>,
        ) -> std::result::Result<usize, i32> {
            self.calls.set(self.calls.get() + 1);
            match value {
                None => {
                    if self.fail_probe {
                        return Err(-30);
                    }
                    Ok(self.payload.len())
                }
                Some(buf) => {
                    if self.fail_fill {
                        return Err(-5);
                    }
                    buf[..self.payload.len()].copy_from_slice(self.payload);
                    Ok(buf.len())
                }
            }
        }
    }

    #[test]
    fn string_lookup_is_exactly_two_calls() {
        let source = FakeQuery::serving(b"NVIDIA CUDA\0");
        let text = string_info(&source, CL_PLATFORM_NAME).unwrap();
        assert_eq!(source.calls.get(), 2);
        assert_eq!(text, "NVIDIA CUDA");
        // probed size minus the trailing NUL
        assert_eq!(text.len(), source.payload.len() - 1);
    }

    #[test]
    fn scalar_lookup_is_one_call() {
        let source = FakeQuery::serving(&[8, 0, 0, 0]);
        let units: u32 = scalar_info(&source, CL_DEVICE_MAX_COMPUTE_UNITS).unwrap();
        assert_eq!(source.calls.get(), 1);
        assert_eq!(units, 8);
    }

    #[test]
    fn probe_failure_names_the_entry_point() {
        let source = FakeQuery {
            fail_probe: true,
            ..FakeQuery::serving(b"x")
        };
        let err = string_info(&source, CL_PLATFORM_VENDOR).unwrap_err();
        match err {
            Error::Api { op, code } => {
                assert_eq!(op, "clGetFakeInfo");
                assert_eq!(code, -30);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn fill_failure_names_the_entry_point() {
        let source = FakeQuery {
            fail_fill: true,
            ..FakeQuery::serving(b"log text\0")
        };
        let err = string_info(&source, CL_PROGRAM_BUILD_LOG).unwrap_err();
        match err {
            Error::Api { op, code } => {
                assert_eq!(op, "clGetFakeInfo");
                assert_eq!(code, -5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn empty_payload_reads_as_empty_string() {
        let source = FakeQuery::serving(b"");
        assert_eq!(string_info(&source, CL_DEVICE_EXTENSIONS).unwrap(), "");
    }

    #[test]
    fn device_list_splits_on_handle_size() {
        const HANDLE: usize = std::mem::size_of::<cl_device_id>();
        // three null handles worth of zero bytes
        static ZEROS: [u8; HANDLE * 3] = [0; HANDLE * 3];
        let source = FakeQuery::serving(&ZEROS);
        let ids = device_list_info(&source, CL_CONTEXT_DEVICES).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(source.calls.get(), 2);
    }
}
