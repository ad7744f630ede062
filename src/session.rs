//! Device session: platform/device selection, context and command queue
//! ownership, and timed synchronous kernel dispatch.

use std::fmt;
use std::ptr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU};
use opencl3::platform::get_platforms;
use opencl3::types::{cl_device_type, cl_uint};

use crate::args::ArgSet;
use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// Which class of compute device a session should be opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// A dedicated accelerator (GPU).
    Gpu,
    /// The host CPU exposed as an OpenCL device. Not every platform
    /// supports this.
    Cpu,
}

impl DeviceClass {
    fn cl_type(self) -> cl_device_type {
        match self {
            DeviceClass::Gpu => CL_DEVICE_TYPE_GPU,
            DeviceClass::Cpu => CL_DEVICE_TYPE_CPU,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Gpu => write!(f, "GPU"),
            DeviceClass::Cpu => write!(f, "CPU"),
        }
    }
}

/// An open connection to one compute device.
///
/// Owns the selected device, its context, and an in-order command queue,
/// plus the kernel-time accumulator fed by [`Session::launch`] and
/// [`Session::run`]. All buffers, programs and kernels created through a
/// session belong to its context; dropping the session releases the queue
/// and context.
///
/// Every transfer and dispatch on a session blocks the calling thread
/// until the device has finished, so successive calls observe a strict
/// happens-before order without extra synchronization.
pub struct Session {
    // Declaration order matters: the queue must be released before the
    // context it was created on.
    queue: CommandQueue,
    context: Context,
    device: Device,
    kernel_time: Mutex<Duration>,
}

// SAFETY: OpenCL 1.2+ guarantees thread safety for context, command queue
// and device handles; the runtime serializes access internally.
unsafe impl Send for Session {}
unsafe impl Sync for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device_name())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a session on the first device of the given class.
    ///
    /// Walks all OpenCL platforms in enumeration order and takes the
    /// first one that yields a device of the requested class.
    pub fn new(class: DeviceClass) -> Result<Self> {
        let platforms = get_platforms()
            .map_err(|e| Error::Context(format!("platform enumeration failed: {:?}", e)))?;

        let mut selected = None;
        for platform in &platforms {
            match platform.get_devices(class.cl_type()) {
                Ok(ids) if !ids.is_empty() => {
                    selected = Some(Device::new(ids[0]));
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!(
                        "platform {} has no {} device: {:?}",
                        platform.name().unwrap_or_default(),
                        class,
                        e
                    );
                }
            }
        }
        let device = selected.ok_or(Error::NoDevice { class })?;

        let context = Context::from_device(&device)
            .map_err(|e| Error::Context(format!("{:?}", e)))?;

        // The OpenCL 1.2 entry point; create_default_with_properties needs
        // a 2.0 runtime, which macOS and several ICDs never shipped.
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, 0)
            .map_err(|e| Error::Queue(format!("{:?}", e)))?;

        let session = Session {
            queue,
            context,
            device,
            kernel_time: Mutex::new(Duration::ZERO),
        };
        log::info!("opened {} session on {}", class, session.device_name());
        Ok(session)
    }

    /// Opens a session on the first available GPU.
    pub fn gpu() -> Result<Self> {
        Self::new(DeviceClass::Gpu)
    }

    /// Opens a session on the host CPU as an OpenCL device.
    pub fn cpu() -> Result<Self> {
        Self::new(DeviceClass::Cpu)
    }

    /// The device's maximum index-space extent along `dim` (0, 1 or 2).
    pub fn max_work_items(&self, dim: usize) -> Result<usize> {
        if dim > 2 {
            return Err(Error::InvalidDimension(dim));
        }
        let sizes = self
            .device
            .max_work_item_sizes()
            .map_err(|e| Error::Context(format!("work-item size query failed: {:?}", e)))?;
        sizes
            .get(dim)
            .copied()
            .ok_or(Error::InvalidDimension(dim))
    }

    /// The device name, or "Unknown" if the query fails.
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".into())
    }

    /// Whether the device advertises double-precision support.
    pub fn supports_fp64(&self) -> bool {
        self.device
            .extensions()
            .map(|e| e.contains("cl_khr_fp64"))
            .unwrap_or(false)
    }

    /// A human-readable dump of the device name, maximum work-group size
    /// and per-axis maximum work-item extents. Formatting only.
    pub fn describe(&self) -> String {
        let name = self.device_name();
        let vendor = self.device.vendor().unwrap_or_else(|_| "Unknown".into());
        let wg = self.device.max_work_group_size().unwrap_or(0);
        let wi = self.device.max_work_item_sizes().unwrap_or_default();
        format!(
            "device: {} ({})\nmax work-group size: {}\nmax work-item sizes: {:?}",
            name.trim(),
            vendor.trim(),
            wg,
            wi
        )
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    /// Dispatches `kernel` over the index space described by `global` and
    /// `local` and blocks until the queue drains.
    ///
    /// The rank of the index space is `global.len()`, which must be 1, 2
    /// or 3 and must equal `local.len()`. The wall time from enqueue to
    /// queue drain is added to the session's kernel-time accumulator.
    pub fn launch(&self, kernel: &Kernel, global: &[usize], local: &[usize]) -> Result<()> {
        if global.is_empty() || global.len() > 3 {
            return Err(Error::InvalidDimension(global.len()));
        }
        if global.len() != local.len() {
            return Err(Error::DimensionMismatch {
                global: global.len(),
                local: local.len(),
            });
        }

        log::trace!("launch {}: global {:?}, local {:?}", kernel.name(), global, local);
        let started = Instant::now();
        unsafe {
            self.queue
                .enqueue_nd_range_kernel(
                    kernel.cl_kernel().get(),
                    global.len() as cl_uint,
                    ptr::null(),
                    global.as_ptr(),
                    local.as_ptr(),
                    &[],
                )
                .map_err(|e| Error::Launch(format!("enqueue failed: {:?}", e)))?;
        }
        self.queue
            .finish()
            .map_err(|e| Error::Launch(format!("queue drain failed: {:?}", e)))?;

        let elapsed = started.elapsed();
        *self.kernel_time.lock().unwrap() += elapsed;
        Ok(())
    }

    /// [`launch`](Self::launch), then copy every double- and float-array
    /// argument in `args` back into its host storage, in bind order.
    ///
    /// Boolean arrays are not copied back automatically; fetch them with
    /// [`ArgSet::fetch_bools`].
    pub fn run(
        &self,
        kernel: &Kernel,
        args: &mut ArgSet,
        global: &[usize],
        local: &[usize],
    ) -> Result<()> {
        self.launch(kernel, global, local)?;
        args.sync_to_host(self)
    }

    /// Total device time accumulated across every launch on this session.
    ///
    /// Only dispatches contribute; host-side time between launches does
    /// not. Never reset for the life of the session.
    pub fn kernel_time(&self) -> Duration {
        *self.kernel_time.lock().unwrap()
    }

    /// The accumulated kernel time formatted for reporting.
    pub fn kernel_time_report(&self) -> String {
        format_kernel_time(self.kernel_time())
    }
}

/// Formats a kernel-time total as minutes/seconds/milliseconds when above
/// a minute, seconds/milliseconds when above a second, else milliseconds.
pub fn format_kernel_time(total: Duration) -> String {
    let msec = total.as_secs_f64() * 1000.0;
    let min = (msec / 60_000.0) as u64;
    let sec = ((msec - min as f64 * 60_000.0) / 1000.0) as u64;
    let rem = msec - min as f64 * 60_000.0 - sec as f64 * 1000.0;

    if msec > 60_000.0 {
        format!("{} min {} sec {:.3} msec", min, sec, rem)
    } else if msec > 1000.0 {
        format!("{} sec {:.3} msec", sec, rem)
    } else {
        format!("{:.3} msec", msec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_millis(0), "0.000 msec")]
    #[case(Duration::from_micros(12_425), "12.425 msec")]
    #[case(Duration::from_millis(1000), "1000.000 msec")]
    #[case(Duration::from_millis(1001), "1 sec 1.000 msec")]
    #[case(Duration::from_millis(59_500), "59 sec 500.000 msec")]
    #[case(Duration::from_millis(60_000), "60 sec 0.000 msec")]
    #[case(Duration::from_millis(121_250), "2 min 1 sec 250.000 msec")]
    fn kernel_time_formatting(#[case] total: Duration, #[case] expected: &str) {
        assert_eq!(format_kernel_time(total), expected);
    }

    #[test]
    fn device_class_display() {
        assert_eq!(DeviceClass::Gpu.to_string(), "GPU");
        assert_eq!(DeviceClass::Cpu.to_string(), "CPU");
    }
}
