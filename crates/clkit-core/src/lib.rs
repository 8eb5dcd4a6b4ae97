//! Host-side OpenCL access layer: enumeration, typed info queries, and
//! owned context/program/kernel/buffer/queue handles.
//!
//! Every wrapper call returns a [`Result`]; the API-failure variant carries
//! the raw driver code together with the name of the C entry point that
//! produced it. Handles release their driver resources on drop.

mod ffi;
pub(crate) mod info;

pub mod buffer;
pub mod context;
pub mod device;
pub mod kernel;
pub mod platform;
pub mod program;
pub mod queue;

#[cfg(feature = "metrics")]
mod metrics;
#[cfg(feature = "metrics")]
pub use metrics::{ALLOC_BYTES, ALLOCS, record, summary};

#[cfg(feature = "memtrace")]
mod memtracer;
#[cfg(feature = "memtrace")]
pub use memtracer::{CopyToken, Dir, flush_csv, start};

pub use buffer::{DeviceMem, GpuBuffer, MemAccess, MemKind, Region, SubBuffer};
pub use context::GpuContext;
pub use device::{Device, DeviceType};
pub use kernel::GpuKernel;
pub use platform::Platform;
pub use program::{BuiltProgram, ProgramSource};
pub use queue::{DeviceQueue, EventGuard};

use opencl3::types::cl_int;

/// Per-device compile log attached to a failed build.
#[derive(Debug, Clone)]
pub struct BuildFailure {
    pub device: String,
    pub log: String,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A driver entry point returned a non-success status.
    #[error("{op} failed: {} ({code})", error_name(*code))]
    Api { op: &'static str, code: cl_int },

    #[error("no OpenCL platform available")]
    NoPlatform,

    #[error("no {wanted} device on this platform")]
    NoDevice { wanted: device::DeviceType },

    #[error("program build failed ({code}): {}", first_log(logs))]
    Build {
        code: cl_int,
        logs: Vec<BuildFailure>,
    },

    #[error("invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("host slice holds {got} elements, buffer holds {expected}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("region [{origin}, {}) exceeds parent extent {parent}", origin + len)]
    RegionOutOfBounds {
        origin: usize,
        len: usize,
        parent: usize,
    },

    #[error("{parts} partitions do not divide {len} elements evenly")]
    UnevenPartition { parts: usize, len: usize },

    #[error("kernel `{kernel}` argument {index} is not bound")]
    UnsetArg { kernel: String, index: u32 },

    #[error("kernel `{kernel}` has {count} arguments, index {index} is out of range")]
    ArgIndexOutOfRange {
        kernel: String,
        index: u32,
        count: u32,
    },

    #[error("work size must have 1 to 3 dimensions, got {dims}")]
    WorkDimension { dims: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<opencl3::error_codes::ClError> for Error {
    fn from(err: opencl3::error_codes::ClError) -> Self {
        Error::Api {
            op: "opencl",
            code: err.0,
        }
    }
}

/// `map_err` adapter that stamps the failing entry point onto the error.
pub(crate) fn api(op: &'static str) -> impl FnOnce(opencl3::error_codes::ClError) -> Error {
    move |err| Error::Api { op, code: err.0 }
}

/// Converts a raw status into `Err(Error::Api)` unless it is `CL_SUCCESS`.
pub(crate) fn cl_check(op: &'static str, code: cl_int) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::Api { op, code })
    }
}

fn first_log(logs: &[BuildFailure]) -> String {
    logs.iter()
        .find(|l| !l.log.trim().is_empty())
        .map(|l| format!("[{}] {}", l.device, l.log.trim()))
        .unwrap_or_else(|| "no build log".into())
}

/// Symbolic name of a driver status code, for diagnostics.
pub fn error_name(code: cl_int) -> &'static str {
    match code {
        0 => "CL_SUCCESS",
        -1 => "CL_DEVICE_NOT_FOUND",
        -2 => "CL_DEVICE_NOT_AVAILABLE",
        -3 => "CL_COMPILER_NOT_AVAILABLE",
        -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
        -5 => "CL_OUT_OF_RESOURCES",
        -6 => "CL_OUT_OF_HOST_MEMORY",
        -7 => "CL_PROFILING_INFO_NOT_AVAILABLE",
        -8 => "CL_MEM_COPY_OVERLAP",
        -11 => "CL_BUILD_PROGRAM_FAILURE",
        -12 => "CL_MAP_FAILURE",
        -13 => "CL_MISALIGNED_SUB_BUFFER_OFFSET",
        -30 => "CL_INVALID_VALUE",
        -31 => "CL_INVALID_DEVICE_TYPE",
        -32 => "CL_INVALID_PLATFORM",
        -33 => "CL_INVALID_DEVICE",
        -34 => "CL_INVALID_CONTEXT",
        -35 => "CL_INVALID_QUEUE_PROPERTIES",
        -36 => "CL_INVALID_COMMAND_QUEUE",
        -37 => "CL_INVALID_HOST_PTR",
        -38 => "CL_INVALID_MEM_OBJECT",
        -42 => "CL_INVALID_BINARY",
        -43 => "CL_INVALID_BUILD_OPTIONS",
        -44 => "CL_INVALID_PROGRAM",
        -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
        -46 => "CL_INVALID_KERNEL_NAME",
        -47 => "CL_INVALID_KERNEL_DEFINITION",
        -48 => "CL_INVALID_KERNEL",
        -49 => "CL_INVALID_ARG_INDEX",
        -50 => "CL_INVALID_ARG_VALUE",
        -51 => "CL_INVALID_ARG_SIZE",
        -52 => "CL_INVALID_KERNEL_ARGS",
        -53 => "CL_INVALID_WORK_DIMENSION",
        -54 => "CL_INVALID_WORK_GROUP_SIZE",
        -55 => "CL_INVALID_WORK_ITEM_SIZE",
        -56 => "CL_INVALID_GLOBAL_OFFSET",
        -57 => "CL_INVALID_EVENT_WAIT_LIST",
        -58 => "CL_INVALID_EVENT",
        -63 => "CL_INVALID_GLOBAL_WORK_SIZE",
        -64 => "CL_INVALID_PROPERTY",
        _ => "CL_UNKNOWN_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_names_operation_and_code() {
        let err = cl_check("clCreateBuffer", -4).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("clCreateBuffer"));
        assert!(msg.contains("CL_MEM_OBJECT_ALLOCATION_FAILURE"));
        assert!(msg.contains("-4"));
    }

    #[test]
    fn success_passes_through() {
        assert!(cl_check("clFinish", 0).is_ok());
    }

    #[test]
    fn unknown_codes_still_render() {
        let msg = Error::Api {
            op: "clEnqueueNDRangeKernel",
            code: -9999,
        }
        .to_string();
        assert!(msg.contains("CL_UNKNOWN_ERROR"));
        assert!(msg.contains("-9999"));
    }

    #[test]
    fn build_error_surfaces_first_nonempty_log() {
        let err = Error::Build {
            code: -11,
            logs: vec![
                BuildFailure {
                    device: "cpu0".into(),
                    log: "   ".into(),
                },
                BuildFailure {
                    device: "gpu0".into(),
                    log: "error: use of undeclared identifier 'j'".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("gpu0"));
        assert!(msg.contains("undeclared identifier"));
    }
}
