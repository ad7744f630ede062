//! Typed device buffers and blocking host↔device transfers.

use std::ptr;

use opencl3::memory::{Buffer, CL_MEM_READ_WRITE};
use opencl3::types::CL_BLOCKING;

use crate::error::{Error, Result};
use crate::session::Session;

/// A fixed-size region of device memory holding `len` elements of `T`.
///
/// Created from a [`Session`]; the underlying OpenCL buffer belongs to
/// that session's context and is released when the `DeviceBuffer` drops.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    buf: Buffer<T>,
    len: usize,
}

// SAFETY: cl_mem handles are opaque, internally synchronized runtime
// objects; all access goes through a command queue.
unsafe impl<T: Send> Send for DeviceBuffer<T> {}
unsafe impl<T: Sync> Sync for DeviceBuffer<T> {}

impl<T> DeviceBuffer<T> {
    /// Allocates a read/write device buffer for `len` elements.
    ///
    /// A zero-length request still allocates one element, because OpenCL
    /// rejects zero-byte buffers; `len()` reports 0 regardless.
    pub fn alloc(session: &Session, len: usize) -> Result<Self> {
        let count = len.max(1);
        let buf = unsafe {
            Buffer::<T>::create(session.context(), CL_MEM_READ_WRITE, count, ptr::null_mut())
                .map_err(|e| Error::BufferAlloc {
                    bytes: count * std::mem::size_of::<T>(),
                    reason: format!("{:?}", e),
                })?
        };
        Ok(DeviceBuffer { buf, len })
    }

    /// Number of elements the buffer was allocated for.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the buffer contents in bytes.
    pub fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    pub(crate) fn cl_buffer(&self) -> &Buffer<T> {
        &self.buf
    }
}

impl<T: Copy> DeviceBuffer<T> {
    /// Allocates a buffer and fills it with `data`.
    pub fn from_slice(session: &Session, data: &[T]) -> Result<Self> {
        let mut buf = Self::alloc(session, data.len())?;
        buf.write(session, data)?;
        Ok(buf)
    }

    /// Blocking copy of `data` into the buffer. `data` must cover the
    /// whole buffer.
    pub fn write(&mut self, session: &Session, data: &[T]) -> Result<()> {
        if data.len() != self.len {
            return Err(Error::Transfer(format!(
                "host array has {} elements, buffer holds {}",
                data.len(),
                self.len
            )));
        }
        if data.is_empty() {
            return Ok(());
        }
        unsafe {
            session
                .queue()
                .enqueue_write_buffer(&mut self.buf, CL_BLOCKING, 0, data, &[])
                .map_err(|e| Error::Transfer(format!("host to device copy failed: {:?}", e)))?;
        }
        Ok(())
    }

    /// Blocking copy of the buffer into `out`. `out` must cover the whole
    /// buffer.
    pub fn read(&self, session: &Session, out: &mut [T]) -> Result<()> {
        if out.len() != self.len {
            return Err(Error::Transfer(format!(
                "host array has {} elements, buffer holds {}",
                out.len(),
                self.len
            )));
        }
        if out.is_empty() {
            return Ok(());
        }
        unsafe {
            session
                .queue()
                .enqueue_read_buffer(&self.buf, CL_BLOCKING, 0, out, &[])
                .map_err(|e| Error::Transfer(format!("device to host copy failed: {:?}", e)))?;
        }
        Ok(())
    }
}
