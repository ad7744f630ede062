//! Kernel source compilation and entry-point extraction.

use opencl3::kernel::Kernel as ClKernel;
use opencl3::program::Program as ClProgram;

use crate::args::{ArgSet, KernelArg};
use crate::error::{Error, Result};
use crate::session::Session;

/// A compiled program: one compilation unit holding one or more kernel
/// entry points.
#[derive(Debug)]
pub struct Program {
    program: ClProgram,
}

// SAFETY: program handles are opaque, internally synchronized runtime
// objects.
unsafe impl Send for Program {}
unsafe impl Sync for Program {}

impl Program {
    /// Resolves the named entry point into a dispatchable kernel handle.
    ///
    /// May be called any number of times, with the same or different
    /// names, to obtain several handles from one compilation pass. The
    /// runtime retains the program for as long as any kernel lives, so
    /// the `Program` itself may be dropped afterwards.
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        let kernel = ClKernel::create(&self.program, name).map_err(|e| Error::EntryPoint {
            name: name.to_string(),
            reason: format!("{:?}", e),
        })?;
        Ok(Kernel {
            kernel,
            name: name.to_string(),
        })
    }
}

/// A single dispatchable entry point within a compiled program.
pub struct Kernel {
    kernel: ClKernel,
    name: String,
}

// SAFETY: kernel handles are opaque, internally synchronized runtime
// objects.
unsafe impl Send for Kernel {}
unsafe impl Sync for Kernel {}

impl Kernel {
    /// The entry-point name this handle was extracted for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn cl_kernel(&self) -> &ClKernel {
        &self.kernel
    }
}

impl Session {
    /// Compiles OpenCL C source against the session's device.
    ///
    /// On failure the error carries the compiler's build log verbatim.
    pub fn build_program(&self, source: &str) -> Result<Program> {
        log::debug!("compiling {} byte kernel source", source.len());
        let program = ClProgram::create_and_build_from_source(self.context(), source, "")
            .map_err(|build_log| Error::Compile { build_log })?;
        Ok(Program { program })
    }

    /// Compile + extract + bind in one call: builds `source`, resolves
    /// `entry`, and binds `args` to it positionally.
    ///
    /// The convenience path for single-kernel workflows; callers that
    /// need several handles from one program use [`Session::build_program`]
    /// and [`Program::kernel`] directly.
    pub fn setup_kernel(
        &self,
        source: &str,
        entry: &str,
        args: Vec<KernelArg>,
    ) -> Result<(Kernel, ArgSet)> {
        let program = self.build_program(source)?;
        let kernel = program.kernel(entry)?;
        let args = self.bind(&kernel, args)?;
        Ok((kernel, args))
    }
}
