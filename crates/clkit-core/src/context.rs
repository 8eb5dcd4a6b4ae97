//! Context ownership: a device group plus the driver context over it.

use std::ptr;

use log::{debug, warn};
use opencl3::context::Context;
use opencl3::types::{cl_device_id, cl_uint};

use crate::device::{Device, DeviceType};
use crate::info::{self, CL_CONTEXT_DEVICES, CL_CONTEXT_NUM_DEVICES, ContextQuery};
use crate::platform::Platform;
use crate::queue::DeviceQueue;
use crate::{Error, Result, api};

/// Owns a driver context and remembers the devices it spans. The underlying
/// handle is released when this is dropped, on every exit path.
pub struct GpuContext {
    ctx: Context,
    devices: Vec<Device>,
}

impl GpuContext {
    /// Context over an explicit device group.
    pub fn new(devices: &[Device]) -> Result<Self> {
        if devices.is_empty() {
            return Err(Error::NoDevice {
                wanted: DeviceType::All,
            });
        }
        let ids: Vec<cl_device_id> = devices.iter().map(|d| d.id()).collect();
        let ctx = if ids.len() == 1 {
            Context::from_device(&opencl3::device::Device::new(ids[0]))
                .map_err(api("clCreateContext"))?
        } else {
            Context::from_devices(&ids, &[], None, ptr::null_mut())
                .map_err(api("clCreateContext"))?
        };
        Ok(Self {
            ctx,
            devices: devices.to_vec(),
        })
    }

    /// Context over a single device.
    pub fn from_device(device: Device) -> Result<Self> {
        Self::new(&[device])
    }

    /// GPU devices first; falls back to CPU when the platform has none or
    /// the GPU context cannot be created.
    pub fn with_fallback(platform: Platform) -> Result<Self> {
        let gpus = platform.devices(DeviceType::Gpu)?;
        if !gpus.is_empty() {
            match Self::new(&gpus) {
                Ok(ctx) => return Ok(ctx),
                Err(err) => warn!("GPU context creation failed ({err}), trying CPU"),
            }
        }
        let cpus = platform.devices(DeviceType::Cpu)?;
        if cpus.is_empty() {
            return Err(Error::NoDevice {
                wanted: DeviceType::Cpu,
            });
        }
        debug!("using CPU context with {} device(s)", cpus.len());
        Self::new(&cpus)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Device count as the driver sees it.
    pub fn device_count(&self) -> Result<u32> {
        let count: cl_uint = info::scalar_info(&ContextQuery(self.ctx.get()), CL_CONTEXT_NUM_DEVICES)?;
        Ok(count)
    }

    /// Device handles as the driver reports them, for cross-checking
    /// against [`Self::devices`].
    pub fn driver_devices(&self) -> Result<Vec<Device>> {
        let ids = info::device_list_info(&ContextQuery(self.ctx.get()), CL_CONTEXT_DEVICES)?;
        Ok(ids.into_iter().map(Device::from_id).collect())
    }

    /// One command queue per device, in device order. Any failure drops the
    /// queues created so far.
    pub fn queues(&self) -> Result<Vec<DeviceQueue>> {
        self.devices
            .iter()
            .map(|d| DeviceQueue::create(self, *d))
            .collect()
    }

    /// Queue for the first device, the common single-device path.
    pub fn default_queue(&self) -> Result<DeviceQueue> {
        DeviceQueue::create(self, self.devices[0])
    }

    pub(crate) fn raw(&self) -> &Context {
        &self.ctx
    }
}
