//! Iterative 1-D relaxation stencil driven through the harness.
//!
//! A length-N vector with a fixed heat value on its first element is
//! repeatedly smoothed with a 3-point weighted average until no interior
//! element moves by more than epsilon. The stencil reads one vector and
//! writes the other; two handles of the same entry point, bound with the
//! array roles swapped, alternate so no copy is needed between steps.
//! The stability flag is computed on the device and fetched explicitly
//! after each step.

use std::time::Instant;

use simplecl::{KernelArg, Session};

const N: usize = 10_000_000;
const EPS: f64 = 0.1;
const HEAT: f64 = 100.0;
const WORK_GROUP: usize = 32;

const KERNEL_SOURCE: &str = r#"
#pragma OPENCL EXTENSION cl_khr_fp64 : enable
__kernel void relax(
    __global double* src,
    __global double* dst,
    __global uchar* stable,
    const double eps,
    const unsigned int count)
{
    int i = get_global_id(0);
    int n = get_global_size(0);
    if (i == 0)
        stable[0] = 1;
    if (i > 0 && i < n - 1) {
        dst[i] = 0.25 * src[i - 1] + 0.5 * src[i] + 0.25 * src[i + 1];
    } else {
        dst[i] = src[i];
    }
    if (fabs(src[i] - dst[i]) > eps)
        stable[0] = 0;
}
"#;

fn main() -> simplecl::Result<()> {
    env_logger::init();

    let session = match Session::gpu() {
        Ok(session) => session,
        Err(err) => {
            log::warn!("no GPU session ({err}); falling back to the host CPU");
            Session::cpu()?
        }
    };
    log::info!("{}", session.describe());
    if !session.supports_fp64() {
        log::warn!("device does not advertise cl_khr_fp64; the relax kernel may not build");
    }

    let mut heat = vec![0.0f64; N];
    heat[0] = HEAT;
    let spare = heat.clone();

    println!("work group size: {WORK_GROUP}");
    println!("global work size: {N}\n");
    println!("size   : {} M ({} MB)", N / 1_000_000, N * 8 / (1024 * 1024));
    println!("heat   : {HEAT:.6}");
    println!("epsilon: {EPS:.6}");

    let wall = Instant::now();

    let program = session.build_program(KERNEL_SOURCE)?;
    let forward = program.kernel("relax")?;
    let backward = program.kernel("relax")?;

    let mut args = session.bind(
        &forward,
        vec![
            KernelArg::DoubleArray(heat),
            KernelArg::DoubleArray(spare),
            KernelArg::BoolArray(vec![false]),
            KernelArg::DoubleConst(EPS),
            KernelArg::IntConst(N as u32),
        ],
    )?;
    // The second handle runs the same stencil with src and dst swapped.
    args.attach_permuted(&backward, &[1, 0, 2, 3, 4])?;

    let global = [N];
    let local = [WORK_GROUP];
    let mut iterations: u64 = 0;
    loop {
        let kernel = if iterations % 2 == 0 { &forward } else { &backward };
        session.run(kernel, &mut args, &global, &local)?;
        iterations += 1;
        if args.fetch_bools(&session, 2)?[0] {
            break;
        }
    }

    println!("Number of iterations: {iterations}");
    println!(
        "wall time: {:.3} msec",
        wall.elapsed().as_secs_f64() * 1000.0
    );
    println!(
        "total time spent in kernel executions: {}",
        session.kernel_time_report()
    );

    args.release();
    Ok(())
}
