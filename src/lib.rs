//! simplecl: a small synchronous OpenCL kernel execution harness.
//!
//! The harness hides device discovery, buffer allocation, host↔device
//! transfer, kernel compilation, typed positional argument binding, and
//! timed dispatch behind a handful of calls, so an iterative numerical
//! algorithm reads as: describe kernel source, describe arguments,
//! repeatedly launch, read back results.
//!
//! # Architecture
//!
//! - **session**: device selection, context and in-order command queue,
//!   dispatch and the kernel-time accumulator
//! - **buffer**: typed device buffers with blocking transfers
//! - **args**: the tagged argument descriptors and the bound-argument
//!   table used for read-back and release
//! - **kernel**: source compilation and entry-point extraction
//! - **error**: one error variant per failure class, propagated from
//!   every layer
//!
//! Every call blocks until the device has finished, so successive calls
//! on one session observe a strict happens-before order; there is no
//! enqueue-and-continue mode and no event surface.
//!
//! # Example
//!
//! ```no_run
//! use simplecl::{KernelArg, Session};
//!
//! # fn main() -> simplecl::Result<()> {
//! let session = Session::gpu()?;
//! let (kernel, mut args) = session.setup_kernel(
//!     r#"__kernel void scale(__global float* v, const unsigned int n) {
//!            unsigned int i = get_global_id(0);
//!            if (i < n) v[i] = v[i] * 2.0f;
//!        }"#,
//!     "scale",
//!     vec![
//!         KernelArg::FloatArray(vec![1.0; 1024]),
//!         KernelArg::IntConst(1024),
//!     ],
//! )?;
//! session.run(&kernel, &mut args, &[1024], &[32])?;
//! let scaled = args.floats(0).unwrap();
//! # let _ = scaled;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod buffer;
pub mod error;
pub mod kernel;
pub mod session;

pub use args::{ArgSet, KernelArg, MAX_KERNEL_ARGS};
pub use buffer::DeviceBuffer;
pub use error::{Error, Result};
pub use kernel::{Kernel, Program};
pub use session::{format_kernel_time, DeviceClass, Session};
