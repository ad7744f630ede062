//! Typed positional kernel arguments: binding, the bound-argument table,
//! and host read-back bookkeeping.

use opencl3::types::cl_uint;

use crate::buffer::DeviceBuffer;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::session::Session;

/// Maximum number of arguments a single bind call accepts.
pub const MAX_KERNEL_ARGS: usize = 16;

/// One kernel argument descriptor, tagged by how it is marshalled.
///
/// Array variants own their host storage; a bind call materializes each
/// into a device buffer, and a synchronizing run copies the device
/// contents back into that storage.
#[derive(Debug, Clone)]
pub enum KernelArg {
    /// Double-precision array, passed as a device buffer.
    DoubleArray(Vec<f64>),
    /// Single-precision array, passed as a device buffer.
    FloatArray(Vec<f32>),
    /// Boolean array, passed as a device buffer of `uchar`.
    BoolArray(Vec<bool>),
    /// 32-bit unsigned constant, passed by value.
    IntConst(u32),
    /// Double-precision constant, passed by value.
    DoubleConst(f64),
}

#[derive(Debug)]
enum BoundArg {
    F64 { host: Vec<f64>, dev: DeviceBuffer<f64> },
    F32 { host: Vec<f32>, dev: DeviceBuffer<f32> },
    Bool { host: Vec<bool>, dev: DeviceBuffer<u8> },
    Uint(u32),
    Double(f64),
}

/// The bound-argument table produced by [`Session::bind`].
///
/// Keeps the ordered argument sequence together with the device buffers
/// the array arguments were materialized into, so that a synchronizing
/// run knows what to copy back and dropping the set releases every
/// buffer. The set is owned by the caller; any number of sets may be
/// live at once, and one set may be attached to several kernels from
/// the same program.
///
/// The buffers belong to the session's context; keep the session alive
/// while the set is in use.
#[derive(Debug)]
pub struct ArgSet {
    args: Vec<BoundArg>,
}

impl Session {
    /// Binds `args`, in order, to the kernel's parameter slots `0..n`.
    ///
    /// Array arguments get a device buffer and a blocking host→device
    /// copy; scalar arguments are bound by value. The first failing
    /// argument aborts the whole bind with [`Error::Bind`], releasing
    /// any buffers already created. Lists longer than
    /// [`MAX_KERNEL_ARGS`] are rejected before any allocation.
    ///
    /// The argument order and arity must match the parameter list in the
    /// kernel source; the harness performs no cross-checking beyond what
    /// the runtime reports per slot.
    pub fn bind(&self, kernel: &Kernel, args: Vec<KernelArg>) -> Result<ArgSet> {
        check_arity(args.len())?;

        let mut bound = Vec::with_capacity(args.len());
        for (index, arg) in args.into_iter().enumerate() {
            let arg = self.bind_one(kernel, index, arg)?;
            bound.push(arg);
        }
        log::debug!("bound {} arguments to kernel {}", bound.len(), kernel.name());
        Ok(ArgSet { args: bound })
    }

    fn bind_one(&self, kernel: &Kernel, index: usize, arg: KernelArg) -> Result<BoundArg> {
        let bound = match arg {
            KernelArg::DoubleArray(host) => {
                let dev = DeviceBuffer::from_slice(self, &host)?;
                BoundArg::F64 { host, dev }
            }
            KernelArg::FloatArray(host) => {
                let dev = DeviceBuffer::from_slice(self, &host)?;
                BoundArg::F32 { host, dev }
            }
            KernelArg::BoolArray(host) => {
                let bytes: Vec<u8> = host.iter().map(|&b| b as u8).collect();
                let dev = DeviceBuffer::from_slice(self, &bytes)?;
                BoundArg::Bool { host, dev }
            }
            KernelArg::IntConst(v) => BoundArg::Uint(v),
            KernelArg::DoubleConst(v) => BoundArg::Double(v),
        };
        set_slot(kernel, index, &bound)?;
        Ok(bound)
    }
}

/// Binds one already-materialized argument to a positional slot.
fn set_slot(kernel: &Kernel, slot: usize, arg: &BoundArg) -> Result<()> {
    let result = unsafe {
        match arg {
            BoundArg::F64 { dev, .. } => kernel.cl_kernel().set_arg(slot as cl_uint, dev.cl_buffer()),
            BoundArg::F32 { dev, .. } => kernel.cl_kernel().set_arg(slot as cl_uint, dev.cl_buffer()),
            BoundArg::Bool { dev, .. } => kernel.cl_kernel().set_arg(slot as cl_uint, dev.cl_buffer()),
            BoundArg::Uint(v) => kernel.cl_kernel().set_arg(slot as cl_uint, v),
            BoundArg::Double(v) => kernel.cl_kernel().set_arg(slot as cl_uint, v),
        }
    };
    result.map_err(|e| Error::Bind {
        index: slot,
        reason: format!("{:?}", e),
    })
}

impl ArgSet {
    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Rebinds the whole set, same order, to another kernel.
    ///
    /// The device buffers are shared: both kernels see the same memory.
    /// Intended for extracting several handles from one program and
    /// pointing them at one argument set.
    pub fn attach(&self, kernel: &Kernel) -> Result<()> {
        for (slot, arg) in self.args.iter().enumerate() {
            set_slot(kernel, slot, arg)?;
        }
        Ok(())
    }

    /// Rebinds the set to another kernel with slots permuted: slot `i`
    /// of `kernel` receives bound argument `order[i]`.
    ///
    /// This is how a double-buffering driver flips the input/output
    /// roles of two array arguments between two handles of the same
    /// entry point. `order` must be a permutation of `0..len`.
    pub fn attach_permuted(&self, kernel: &Kernel, order: &[usize]) -> Result<()> {
        validate_permutation(order, self.args.len())?;
        for (slot, &src) in order.iter().enumerate() {
            set_slot(kernel, slot, &self.args[src])?;
        }
        Ok(())
    }

    /// The host copy of the double array bound at `index`, if that slot
    /// holds one. Stale until the next synchronizing run.
    pub fn doubles(&self, index: usize) -> Option<&[f64]> {
        match self.args.get(index) {
            Some(BoundArg::F64 { host, .. }) => Some(host),
            _ => None,
        }
    }

    /// The host copy of the float array bound at `index`, if that slot
    /// holds one.
    pub fn floats(&self, index: usize) -> Option<&[f32]> {
        match self.args.get(index) {
            Some(BoundArg::F32 { host, .. }) => Some(host),
            _ => None,
        }
    }

    /// The host copy of the boolean array bound at `index`, if that slot
    /// holds one. Booleans are never synchronized automatically; see
    /// [`ArgSet::fetch_bools`].
    pub fn bools(&self, index: usize) -> Option<&[bool]> {
        match self.args.get(index) {
            Some(BoundArg::Bool { host, .. }) => Some(host),
            _ => None,
        }
    }

    /// Copies every double and float array back into its host storage,
    /// in bind order. Boolean arrays are skipped.
    pub(crate) fn sync_to_host(&mut self, session: &Session) -> Result<()> {
        for arg in &mut self.args {
            match arg {
                BoundArg::F64 { host, dev } => dev.read(session, host)?,
                BoundArg::F32 { host, dev } => dev.read(session, host)?,
                BoundArg::Bool { .. } | BoundArg::Uint(_) | BoundArg::Double(_) => {}
            }
        }
        Ok(())
    }

    /// Explicitly copies the boolean array at `index` back from the
    /// device and returns the refreshed host view.
    pub fn fetch_bools(&mut self, session: &Session, index: usize) -> Result<&[bool]> {
        match self.args.get_mut(index) {
            Some(BoundArg::Bool { host, dev }) => {
                let mut bytes = vec![0u8; host.len()];
                dev.read(session, &mut bytes)?;
                for (dst, src) in host.iter_mut().zip(&bytes) {
                    *dst = *src != 0;
                }
                Ok(host)
            }
            _ => Err(Error::Transfer(format!(
                "argument {} is not a boolean array",
                index
            ))),
        }
    }

    /// Releases every device buffer in the set.
    ///
    /// Dropping the set does the same; this form exists for call sites
    /// that want the release to be visible. Move semantics make a double
    /// release unrepresentable.
    pub fn release(self) {}
}

fn check_arity(count: usize) -> Result<()> {
    if count > MAX_KERNEL_ARGS {
        return Err(Error::TooManyArgs {
            count,
            max: MAX_KERNEL_ARGS,
        });
    }
    Ok(())
}

fn validate_permutation(order: &[usize], len: usize) -> Result<()> {
    if order.len() != len {
        return Err(Error::InvalidPermutation(format!(
            "order has {} entries for {} bound arguments",
            order.len(),
            len
        )));
    }
    let mut seen = vec![false; len];
    for &i in order {
        if i >= len {
            return Err(Error::InvalidPermutation(format!(
                "index {} out of range for {} bound arguments",
                i, len
            )));
        }
        if seen[i] {
            return Err(Error::InvalidPermutation(format!(
                "index {} appears more than once",
                i
            )));
        }
        seen[i] = true;
    }
    Ok(())
}
