//! Program lifecycle: source → built executable, or a per-device log.
//!
//! The unbuilt and built stages are separate types, so a kernel can only
//! ever be created from a program that compiled. A failed build consumes
//! the source stage; recovery means fixing the source and starting over.

use std::fs;
use std::path::Path;

use log::debug;
use opencl3::program::Program;
use opencl3::types::cl_device_id;

use crate::context::GpuContext;
use crate::device::Device;
use crate::info::{self, BuildQuery, CL_PROGRAM_BUILD_LOG};
use crate::{BuildFailure, Error, Result, api};

/// Kernel source that has not been handed to the compiler yet.
pub struct ProgramSource {
    source: String,
}

impl ProgramSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Reads a `.cl` file whole; the text is passed to the compiler
    /// verbatim.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            source: fs::read_to_string(path)?,
        })
    }

    pub fn text(&self) -> &str {
        &self.source
    }

    /// Compiles for every device of `ctx`. On failure the error carries the
    /// build log of each device, fetched through the info-query path.
    pub fn build(self, ctx: &GpuContext, options: &str) -> Result<BuiltProgram> {
        #[cfg(feature = "metrics")]
        let t = std::time::Instant::now();

        let mut program =
            Program::create_from_source(ctx.raw(), &self.source).map_err(api("clCreateProgramWithSource"))?;

        let ids: Vec<cl_device_id> = ctx.devices().iter().map(|d| d.id()).collect();
        if let Err(err) = program.build(&ids, options) {
            let logs = collect_logs(&program, ctx.devices());
            return Err(Error::Build {
                code: err.0,
                logs,
            });
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record("build_program", t);

        debug!("built program for {} device(s)", ids.len());
        Ok(BuiltProgram {
            program,
            devices: ctx.devices().to_vec(),
        })
    }
}

fn collect_logs(program: &Program, devices: &[Device]) -> Vec<BuildFailure> {
    devices
        .iter()
        .map(|dev| {
            let query = BuildQuery {
                program: program.get(),
                device: dev.id(),
            };
            BuildFailure {
                device: dev.name().unwrap_or_else(|_| "unknown device".into()),
                log: info::string_info(&query, CL_PROGRAM_BUILD_LOG).unwrap_or_default(),
            }
        })
        .collect()
}

/// A successfully compiled program; the only source of kernels.
pub struct BuiltProgram {
    program: Program,
    devices: Vec<Device>,
}

impl BuiltProgram {
    /// Compiler output for one device; non-fatal warnings land here.
    pub fn build_log(&self, device: Device) -> Result<String> {
        let query = BuildQuery {
            program: self.program.get(),
            device: device.id(),
        };
        info::string_info(&query, CL_PROGRAM_BUILD_LOG)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub(crate) fn raw(&self) -> &Program {
        &self.program
    }
}
