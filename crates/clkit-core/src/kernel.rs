//! Kernel handles with per-slot argument tracking.
//!
//! The driver rejects launches with unset arguments late and cryptically
//! (`CL_INVALID_KERNEL_ARGS` at enqueue). Here the slot count is read at
//! creation and every `set_*` marks its slot, so an incomplete binding is
//! reported before anything is submitted, with the offending index.

use bytemuck::Pod;
use opencl3::kernel::Kernel;

use crate::buffer::DeviceMem;
use crate::info::{self, CL_KERNEL_FUNCTION_NAME, CL_KERNEL_NUM_ARGS, KernelQuery};
use crate::program::BuiltProgram;
use crate::{Error, Result, api};

/// Which argument slots have been bound since creation.
#[derive(Debug)]
pub(crate) struct ArgTable {
    bound: Vec<bool>,
}

impl ArgTable {
    pub(crate) fn new(count: u32) -> Self {
        Self {
            bound: vec![false; count as usize],
        }
    }

    pub(crate) fn count(&self) -> u32 {
        self.bound.len() as u32
    }

    pub(crate) fn in_range(&self, index: u32) -> bool {
        (index as usize) < self.bound.len()
    }

    pub(crate) fn mark(&mut self, index: u32) {
        self.bound[index as usize] = true;
    }

    pub(crate) fn first_unbound(&self) -> Option<u32> {
        self.bound.iter().position(|b| !b).map(|i| i as u32)
    }
}

/// A named entry point of a built program.
pub struct GpuKernel {
    kernel: Kernel,
    name: String,
    args: ArgTable,
}

impl GpuKernel {
    /// Only a [`BuiltProgram`] can get here, which is the point.
    pub fn create(program: &BuiltProgram, name: &str) -> Result<Self> {
        let kernel = Kernel::create(program.raw(), name).map_err(api("clCreateKernel"))?;
        let count: u32 = info::scalar_info(&KernelQuery(kernel.get()), CL_KERNEL_NUM_ARGS)?;
        Ok(Self {
            kernel,
            name: name.to_owned(),
            args: ArgTable::new(count),
        })
    }

    /// Binds a plain-old-data value to slot `index`.
    pub fn set_arg<T: Pod>(&mut self, index: u32, value: &T) -> Result<()> {
        self.check_index(index)?;
        unsafe {
            self.kernel
                .set_arg(index, value)
                .map_err(api("clSetKernelArg"))?;
        }
        self.args.mark(index);
        Ok(())
    }

    /// Binds a buffer or sub-buffer to slot `index`.
    pub fn set_mem_arg<T: Pod, M: DeviceMem<T>>(&mut self, index: u32, mem: &M) -> Result<()> {
        self.check_index(index)?;
        let handle = mem.mem_handle();
        unsafe {
            self.kernel
                .set_arg(index, &handle)
                .map_err(api("clSetKernelArg"))?;
        }
        self.args.mark(index);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_args(&self) -> u32 {
        self.args.count()
    }

    /// The entry-point name as the driver reports it.
    pub fn function_name(&self) -> Result<String> {
        info::string_info(&KernelQuery(self.kernel.get()), CL_KERNEL_FUNCTION_NAME)
    }

    /// Every slot must be bound before a launch is accepted.
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self.args.first_unbound() {
            None => Ok(()),
            Some(index) => Err(Error::UnsetArg {
                kernel: self.name.clone(),
                index,
            }),
        }
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if self.args.in_range(index) {
            Ok(())
        } else {
            Err(Error::ArgIndexOutOfRange {
                kernel: self.name.clone(),
                index,
                count: self.args.count(),
            })
        }
    }

    pub(crate) fn raw(&self) -> &Kernel {
        &self.kernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_reports_slot_zero() {
        let table = ArgTable::new(3);
        assert_eq!(table.first_unbound(), Some(0));
    }

    #[test]
    fn table_completes_in_any_order() {
        let mut table = ArgTable::new(3);
        table.mark(2);
        table.mark(0);
        assert_eq!(table.first_unbound(), Some(1));
        table.mark(1);
        assert_eq!(table.first_unbound(), None);
    }

    #[test]
    fn zero_arg_kernels_are_always_ready() {
        let table = ArgTable::new(0);
        assert_eq!(table.first_unbound(), None);
    }

    #[test]
    fn range_check_matches_count() {
        let table = ArgTable::new(2);
        assert!(table.in_range(0));
        assert!(table.in_range(1));
        assert!(!table.in_range(2));
    }
}
