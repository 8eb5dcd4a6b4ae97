//! Raw driver entry points for the query side of the API.
//!
//! Creation and enqueue go through `opencl3`; only the `clGet*` family is
//! declared here because the size-probe/fill convention around it is
//! implemented by this crate (see [`crate::info`]). Links against the same
//! ICD loader `opencl3` pulls in.

use std::ffi::c_void;

use opencl3::types::{
    cl_context, cl_device_id, cl_device_type, cl_int, cl_kernel, cl_mem, cl_platform_id,
    cl_program, cl_uint,
};

#[cfg_attr(not(target_os = "macos"), link(name = "OpenCL"))]
#[cfg_attr(target_os = "macos", link(name = "OpenCL", kind = "framework"))]
unsafe extern "system" {
    pub(crate) fn clGetPlatformIDs(
        num_entries: cl_uint,
        platforms: *mut cl_platform_id,
        num_platforms: *mut cl_uint,
    ) -> cl_int;

    pub(crate) fn clGetDeviceIDs(
        platform: cl_platform_id,
        device_type: cl_device_type,
        num_entries: cl_uint,
        devices: *mut cl_device_id,
        num_devices: *mut cl_uint,
    ) -> cl_int;

    pub(crate) fn clGetPlatformInfo(
        platform: cl_platform_id,
        param_name: cl_uint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int;

    pub(crate) fn clGetDeviceInfo(
        device: cl_device_id,
        param_name: cl_uint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int;

    pub(crate) fn clGetContextInfo(
        context: cl_context,
        param_name: cl_uint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int;

    pub(crate) fn clGetMemObjectInfo(
        memobj: cl_mem,
        param_name: cl_uint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int;

    pub(crate) fn clGetKernelInfo(
        kernel: cl_kernel,
        param_name: cl_uint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int;

    pub(crate) fn clGetProgramBuildInfo(
        program: cl_program,
        device: cl_device_id,
        param_name: cl_uint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> cl_int;
}
