//! Per-device command queues and completion guards.
//!
//! Submission is ordered per queue; queues of different devices run
//! independently and are only joined by an explicit wait on the collected
//! events ([`EventGuard::wait_all`]). There is no cancellation or timeout.

use std::mem::ManuallyDrop;
use std::ptr;

use bytemuck::Pod;
use opencl3::command_queue::CommandQueue;
use opencl3::event::{Event, wait_for_events};
use opencl3::types::{CL_BLOCKING, CL_NON_BLOCKING, cl_event, cl_uint};

use crate::buffer::DeviceMem;
use crate::context::GpuContext;
use crate::device::Device;
use crate::kernel::GpuKernel;
use crate::{Error, Result, api};

#[cfg(feature = "memtrace")]
use crate::memtracer::{Dir, start};

/// Ordered submission channel for one device of a context.
pub struct DeviceQueue {
    queue: CommandQueue,
    device: Device,
}

impl DeviceQueue {
    pub fn create(ctx: &GpuContext, device: Device) -> Result<Self> {
        let queue = unsafe { CommandQueue::create(ctx.raw(), device.id(), 0) }
            .map_err(api("clCreateCommandQueue"))?;
        Ok(Self { queue, device })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Queues a host-to-device copy; the guard waits for completion when
    /// dropped or explicitly waited on.
    pub fn write<T: Pod, M: DeviceMem<T>>(&self, dst: &mut M, data: &[T]) -> Result<EventGuard> {
        check_len(dst.len(), data.len())?;

        #[cfg(feature = "metrics")]
        let t = std::time::Instant::now();
        #[cfg(feature = "memtrace")]
        let token = start(Dir::H2D, dst.byte_len());

        let evt = unsafe {
            self.queue
                .enqueue_write_buffer(dst.raw_mut(), CL_NON_BLOCKING, 0, data, &[])
                .map_err(api("clEnqueueWriteBuffer"))?
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record("enqueue_write", t);

        let guard = EventGuard::new(evt);
        #[cfg(feature = "memtrace")]
        let guard = guard.traced(token);
        Ok(guard)
    }

    /// Queues a device-to-host copy into `out`.
    pub fn read<T: Pod, M: DeviceMem<T>>(&self, src: &M, out: &mut [T]) -> Result<EventGuard> {
        check_len(src.len(), out.len())?;

        #[cfg(feature = "metrics")]
        let t = std::time::Instant::now();
        #[cfg(feature = "memtrace")]
        let token = start(Dir::D2H, src.byte_len());

        let evt = unsafe {
            self.queue
                .enqueue_read_buffer(src.raw(), CL_NON_BLOCKING, 0, out, &[])
                .map_err(api("clEnqueueReadBuffer"))?
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record("enqueue_read", t);

        let guard = EventGuard::new(evt);
        #[cfg(feature = "memtrace")]
        let guard = guard.traced(token);
        Ok(guard)
    }

    /// Copy that returns only once the transfer is done.
    pub fn write_blocking<T: Pod, M: DeviceMem<T>>(&self, dst: &mut M, data: &[T]) -> Result<()> {
        check_len(dst.len(), data.len())?;

        #[cfg(feature = "memtrace")]
        let token = start(Dir::H2D, dst.byte_len());

        unsafe {
            self.queue
                .enqueue_write_buffer(dst.raw_mut(), CL_BLOCKING, 0, data, &[])
                .map_err(api("clEnqueueWriteBuffer"))?;
        }

        #[cfg(feature = "memtrace")]
        token.finish();
        Ok(())
    }

    /// Read that returns only once `out` is filled.
    pub fn read_blocking<T: Pod, M: DeviceMem<T>>(&self, src: &M, out: &mut [T]) -> Result<()> {
        check_len(src.len(), out.len())?;

        #[cfg(feature = "memtrace")]
        let token = start(Dir::D2H, src.byte_len());

        unsafe {
            self.queue
                .enqueue_read_buffer(src.raw(), CL_BLOCKING, 0, out, &[])
                .map_err(api("clEnqueueReadBuffer"))?;
        }

        #[cfg(feature = "memtrace")]
        token.finish();
        Ok(())
    }

    /// Submits a kernel over `global` work items. Refused while any kernel
    /// argument slot is unbound.
    pub fn enqueue_kernel(
        &self,
        kernel: &GpuKernel,
        global: &[usize],
        local: Option<&[usize]>,
    ) -> Result<EventGuard> {
        kernel.ensure_ready()?;

        let dims = global.len();
        if dims == 0 || dims > 3 {
            return Err(Error::WorkDimension { dims });
        }
        if let Some(l) = local {
            if l.len() != dims {
                return Err(Error::WorkDimension { dims: l.len() });
            }
        }

        #[cfg(feature = "metrics")]
        let t = std::time::Instant::now();
        #[cfg(feature = "memtrace")]
        let token = start(Dir::Kernel, 0);

        let local_ptr = local.map_or(ptr::null(), |l| l.as_ptr());
        let evt = unsafe {
            self.queue
                .enqueue_nd_range_kernel(
                    kernel.raw().get(),
                    dims as cl_uint,
                    ptr::null(),
                    global.as_ptr(),
                    local_ptr,
                    &[],
                )
                .map_err(api("clEnqueueNDRangeKernel"))?
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record("enqueue_kernel", t);

        let guard = EventGuard::new(evt);
        #[cfg(feature = "memtrace")]
        let guard = guard.traced(token);
        Ok(guard)
    }

    /// Blocks until everything submitted to this queue has completed.
    pub fn finish(&self) -> Result<()> {
        self.queue.finish().map_err(api("clFinish"))
    }
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::SizeMismatch { expected, got })
    }
}

/// Owns the completion event of one submission; waits on drop so results
/// cannot be observed before the driver is done with them.
pub struct EventGuard {
    evt: Event,
    #[cfg(feature = "memtrace")]
    token: Option<crate::memtracer::CopyToken>,
}

impl EventGuard {
    fn new(evt: Event) -> Self {
        Self {
            evt,
            #[cfg(feature = "memtrace")]
            token: None,
        }
    }

    #[cfg(feature = "memtrace")]
    fn traced(mut self, token: crate::memtracer::CopyToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Explicit wait; the event handle is still released exactly once.
    pub fn wait(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        // Safety: ManuallyDrop suppresses the Drop impl, so each field is
        // moved out exactly once.
        let evt = unsafe { ptr::read(&this.evt) };
        #[cfg(feature = "memtrace")]
        let token = unsafe { ptr::read(&this.token) };

        let result = evt.wait().map_err(api("clWaitForEvents"));

        #[cfg(feature = "memtrace")]
        if let Some(token) = token {
            token.finish();
        }
        result
    }

    /// Waits on the whole set at once; the join point for work spread over
    /// independent per-device queues.
    pub fn wait_all(guards: Vec<EventGuard>) -> Result<()> {
        if guards.is_empty() {
            return Ok(());
        }
        let raw: Vec<cl_event> = guards.iter().map(|g| g.evt.get()).collect();
        wait_for_events(&raw).map_err(|code| Error::Api {
            op: "clWaitForEvents",
            code,
        })?;

        for guard in guards {
            let this = ManuallyDrop::new(guard);
            // Safety: as in `wait`, fields leave the suppressed guard once.
            drop(unsafe { ptr::read(&this.evt) });
            #[cfg(feature = "memtrace")]
            if let Some(token) = unsafe { ptr::read(&this.token) } {
                token.finish();
            }
        }
        Ok(())
    }
}

impl Drop for EventGuard {
    fn drop(&mut self) {
        let _ = self.evt.wait();
        #[cfg(feature = "memtrace")]
        if let Some(token) = self.token.take() {
            token.finish();
        }
    }
}
