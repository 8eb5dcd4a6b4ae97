//! Device memory: typed buffers, sub-buffer views, and partitioning.

use std::ptr;

use bytemuck::Pod;
use opencl3::memory::{
    Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY, ClMem,
};
use opencl3::types::{cl_mem, cl_mem_flags, cl_uint};

use crate::context::GpuContext;
use crate::info::{self, CL_MEM_OFFSET, CL_MEM_SIZE, CL_MEM_TYPE, MemQuery};
use crate::queue::DeviceQueue;
use crate::{Error, Result, api};

#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

const CL_MEM_OBJECT_BUFFER: cl_uint = 0x10F0;
const CL_MEM_OBJECT_IMAGE2D: cl_uint = 0x10F1;
const CL_MEM_OBJECT_IMAGE3D: cl_uint = 0x10F2;

/// Host visibility of a buffer from kernel code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemAccess {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl MemAccess {
    fn raw(self) -> cl_mem_flags {
        match self {
            MemAccess::ReadWrite => CL_MEM_READ_WRITE,
            MemAccess::ReadOnly => CL_MEM_READ_ONLY,
            MemAccess::WriteOnly => CL_MEM_WRITE_ONLY,
        }
    }
}

/// What the driver says a mem object is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemKind {
    Buffer,
    Image,
    Other,
}

impl MemKind {
    fn from_raw(raw: cl_uint) -> MemKind {
        match raw {
            CL_MEM_OBJECT_BUFFER => MemKind::Buffer,
            CL_MEM_OBJECT_IMAGE2D | CL_MEM_OBJECT_IMAGE3D => MemKind::Image,
            _ => MemKind::Other,
        }
    }
}

/// An element range inside a parent buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub origin: usize,
    pub len: usize,
}

impl Region {
    pub fn new(origin: usize, len: usize) -> Self {
        Self { origin, len }
    }

    /// One past the last element.
    pub fn end(&self) -> usize {
        self.origin + self.len
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.origin < other.end() && other.origin < self.end()
    }
}

/// `parts` equal regions exactly tiling `[0, len)`; region `i` covers
/// `[i * (len / parts), (i + 1) * (len / parts))`. Rejected unless `parts`
/// divides `len`, so there is never a gap or an overlap.
pub(crate) fn tile_regions(len: usize, parts: usize) -> Result<Vec<Region>> {
    if parts == 0 || len % parts != 0 {
        return Err(Error::UnevenPartition { parts, len });
    }
    let chunk = len / parts;
    Ok((0..parts).map(|i| Region::new(i * chunk, chunk)).collect())
}

/// Anything a queue can copy into/out of and a kernel can take as a mem
/// argument: whole buffers and sub-buffer views.
pub trait DeviceMem<T: Pod> {
    fn raw(&self) -> &Buffer<T>;
    fn raw_mut(&mut self) -> &mut Buffer<T>;
    /// Extent in elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn byte_len(&self) -> usize {
        self.len() * std::mem::size_of::<T>()
    }

    /// Raw driver handle, the form kernel arguments are passed in.
    fn mem_handle(&self) -> cl_mem {
        self.raw().get()
    }

    /// Object kind as reported by the driver.
    fn mem_kind(&self) -> Result<MemKind> {
        let raw: cl_uint = info::scalar_info(&MemQuery(self.mem_handle()), CL_MEM_TYPE)?;
        Ok(MemKind::from_raw(raw))
    }

    /// Allocation size in bytes as reported by the driver.
    fn size_bytes(&self) -> Result<usize> {
        info::scalar_info(&MemQuery(self.mem_handle()), CL_MEM_SIZE)
    }
}

/// A device allocation of `len` elements, released on drop.
pub struct GpuBuffer<T: Pod> {
    buf: Buffer<T>,
    len: usize,
}

impl<T: Pod> GpuBuffer<T> {
    /// Read-write allocation; zero length is rejected up front rather than
    /// letting the driver fail it.
    pub fn new(ctx: &GpuContext, len: usize) -> Result<Self> {
        Self::with_access(ctx, len, MemAccess::ReadWrite)
    }

    pub fn with_access(ctx: &GpuContext, len: usize, access: MemAccess) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidSize(len));
        }

        #[cfg(feature = "metrics")]
        let t = std::time::Instant::now();

        let buf = unsafe {
            Buffer::<T>::create(ctx.raw(), access.raw(), len, ptr::null_mut())
                .map_err(api("clCreateBuffer"))?
        };

        #[cfg(feature = "metrics")]
        {
            crate::metrics::record("create_buffer", t);
            crate::metrics::ALLOCS.fetch_add(1, Ordering::Relaxed);
            crate::metrics::ALLOC_BYTES.fetch_add(len * std::mem::size_of::<T>(), Ordering::Relaxed);
        }

        Ok(Self { buf, len })
    }

    /// Allocate and blocking-write `data` in one step.
    pub fn from_slice(ctx: &GpuContext, queue: &DeviceQueue, data: &[T]) -> Result<Self> {
        let mut buf = Self::new(ctx, data.len())?;
        queue.write_blocking(&mut buf, data)?;
        Ok(buf)
    }

    /// A view of `region`, which must lie inside this buffer's extent. The
    /// view borrows the parent, so it cannot outlive the memory it aliases.
    pub fn sub_buffer(&self, region: Region) -> Result<SubBuffer<'_, T>> {
        if region.len == 0 {
            return Err(Error::InvalidSize(0));
        }
        if region.end() > self.len {
            return Err(Error::RegionOutOfBounds {
                origin: region.origin,
                len: region.len,
                parent: self.len,
            });
        }
        // flags 0 inherits the parent's access mode
        let buf = unsafe {
            self.buf
                .create_sub_buffer(0, region.origin, region.len)
                .map_err(api("clCreateSubBuffer"))?
        };
        Ok(SubBuffer {
            buf,
            region,
            parent: self,
        })
    }

    /// Disjoint equal views tiling the whole buffer, one per worker; the
    /// multi-device split path.
    pub fn partition(&self, parts: usize) -> Result<Vec<SubBuffer<'_, T>>> {
        tile_regions(self.len, parts)?
            .into_iter()
            .map(|region| self.sub_buffer(region))
            .collect()
    }
}

impl<T: Pod> DeviceMem<T> for GpuBuffer<T> {
    fn raw(&self) -> &Buffer<T> {
        &self.buf
    }

    fn raw_mut(&mut self) -> &mut Buffer<T> {
        &mut self.buf
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(feature = "metrics")]
impl<T: Pod> Drop for GpuBuffer<T> {
    fn drop(&mut self) {
        crate::metrics::ALLOCS.fetch_sub(1, Ordering::Relaxed);
        crate::metrics::ALLOC_BYTES.fetch_sub(self.len * std::mem::size_of::<T>(), Ordering::Relaxed);
    }
}

/// Offset/length view into a parent buffer; shares the parent's memory.
pub struct SubBuffer<'a, T: Pod> {
    buf: Buffer<T>,
    region: Region,
    parent: &'a GpuBuffer<T>,
}

impl<'a, T: Pod> SubBuffer<'a, T> {
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn parent(&self) -> &GpuBuffer<T> {
        self.parent
    }

    /// Byte offset inside the parent as the driver reports it.
    pub fn offset_bytes(&self) -> Result<usize> {
        info::scalar_info(&MemQuery(self.mem_handle()), CL_MEM_OFFSET)
    }
}

impl<'a, T: Pod> DeviceMem<T> for SubBuffer<'a, T> {
    fn raw(&self) -> &Buffer<T> {
        &self.buf
    }

    fn raw_mut(&mut self) -> &mut Buffer<T> {
        &mut self.buf
    }

    fn len(&self) -> usize {
        self.region.len
    }
}
