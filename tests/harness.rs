//! Integration tests for the harness.
//!
//! Every test needs a live OpenCL runtime; each one skips cleanly when
//! no device is available.

use std::time::Duration;

use simplecl::{DeviceClass, DeviceBuffer, Error, KernelArg, Session};

fn test_session() -> Option<Session> {
    let _ = env_logger::builder().is_test(true).try_init();
    Session::gpu().or_else(|_| Session::cpu()).ok()
}

/// Adds one to every element and raises a device-side flag.
const MARK_KERNEL: &str = r#"
__kernel void mark(__global float* v, __global uchar* flag, const unsigned int n) {
    unsigned int i = get_global_id(0);
    if (i < n)
        v[i] = v[i] + 1.0f;
    if (i == 0)
        flag[0] = 1;
}
"#;

const RELAX_KERNEL: &str = r#"
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

#[test]
fn session_open_and_drop() {
    let _ = env_logger::builder().is_test(true).try_init();
    for class in [DeviceClass::Gpu, DeviceClass::Cpu] {
        match Session::new(class) {
            Ok(session) => {
                println!("{}", session.describe());
                drop(session);
            }
            Err(err) => println!("no {class} device: {err}"),
        }
    }
}

#[test]
fn max_work_items_dimensions() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    for dim in 0..3 {
        let extent = session.max_work_items(dim).unwrap();
        assert!(extent > 0, "dimension {dim} reported extent 0");
    }
    assert!(matches!(
        session.max_work_items(3),
        Err(Error::InvalidDimension(3))
    ));
}

#[test]
fn buffer_round_trip() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let data: Vec<f32> = (0..1024).map(|i| i as f32 * 0.5).collect();
    let buf = DeviceBuffer::from_slice(&session, &data).unwrap();
    let mut back = vec![0.0f32; data.len()];
    buf.read(&session, &mut back).unwrap();
    assert_eq!(back, data);

    let doubles: Vec<f64> = (0..257).map(|i| 1.0 / (i as f64 + 1.0)).collect();
    let buf = DeviceBuffer::from_slice(&session, &doubles).unwrap();
    let mut back = vec![0.0f64; doubles.len()];
    buf.read(&session, &mut back).unwrap();
    assert_eq!(back, doubles);
}

#[test]
fn buffer_round_trip_empty() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let buf = DeviceBuffer::<f64>::from_slice(&session, &[]).unwrap();
    assert_eq!(buf.len(), 0);
    assert!(buf.is_empty());
    let mut back: Vec<f64> = Vec::new();
    buf.read(&session, &mut back).unwrap();
    assert!(back.is_empty());
}

#[test]
fn buffer_length_mismatch_is_an_error() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let buf = DeviceBuffer::<f32>::from_slice(&session, &[1.0, 2.0]).unwrap();
    let mut too_short = vec![0.0f32; 1];
    assert!(matches!(
        buf.read(&session, &mut too_short),
        Err(Error::Transfer(_))
    ));
}

#[test]
fn compile_failure_reports_build_log() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let err = session
        .build_program("__kernel void broken( { this is not OpenCL C }")
        .unwrap_err();
    match err {
        Error::Compile { build_log } => {
            assert!(!build_log.is_empty(), "build log should not be empty");
        }
        other => panic!("expected Compile, got {other:?}"),
    }
}

#[test]
fn unknown_entry_point_is_an_error() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let program = session.build_program(MARK_KERNEL).unwrap();
    assert!(matches!(
        program.kernel("no_such_kernel"),
        Err(Error::EntryPoint { .. })
    ));
}

#[test]
fn bind_rejects_oversized_argument_lists() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let program = session.build_program(MARK_KERNEL).unwrap();
    let kernel = program.kernel("mark").unwrap();

    let args = vec![KernelArg::IntConst(0); simplecl::MAX_KERNEL_ARGS + 1];
    match session.bind(&kernel, args) {
        Err(Error::TooManyArgs { count, max }) => {
            assert_eq!(count, simplecl::MAX_KERNEL_ARGS + 1);
            assert_eq!(max, simplecl::MAX_KERNEL_ARGS);
        }
        other => panic!("expected TooManyArgs, got {other:?}"),
    }
}

#[test]
fn run_syncs_arrays_but_not_bools() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let n = 16usize;
    let (kernel, mut args) = session
        .setup_kernel(
            MARK_KERNEL,
            "mark",
            vec![
                KernelArg::FloatArray(vec![0.0; n]),
                KernelArg::BoolArray(vec![false]),
                KernelArg::IntConst(n as u32),
            ],
        )
        .unwrap();

    session.run(&kernel, &mut args, &[n], &[4]).unwrap();

    // Float arrays come back with the run.
    let v = args.floats(0).unwrap();
    assert!(v.iter().all(|&x| x == 1.0));

    // The boolean array does not; the device raised it but the host copy
    // is untouched until the explicit fetch.
    assert_eq!(args.bools(1).unwrap(), &[false]);
    assert_eq!(args.fetch_bools(&session, 1).unwrap(), &[true]);

    // A second run accumulates on the device contents.
    session.run(&kernel, &mut args, &[n], &[4]).unwrap();
    let v = args.floats(0).unwrap();
    assert!(v.iter().all(|&x| x == 2.0));

    args.release();
}

#[test]
fn kernel_time_only_grows_with_launches() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let n = 1024usize;
    let (kernel, mut args) = session
        .setup_kernel(
            MARK_KERNEL,
            "mark",
            vec![
                KernelArg::FloatArray(vec![0.0; n]),
                KernelArg::BoolArray(vec![false]),
                KernelArg::IntConst(n as u32),
            ],
        )
        .unwrap();

    assert_eq!(session.kernel_time(), Duration::ZERO);

    session.launch(&kernel, &[n], &[32]).unwrap();
    let after_first = session.kernel_time();
    assert!(after_first > Duration::ZERO);

    // Host-side delays contribute nothing.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(session.kernel_time(), after_first);

    session.run(&kernel, &mut args, &[n], &[32]).unwrap();
    assert!(session.kernel_time() > after_first);
}

#[test]
fn launch_validates_index_space_rank() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let program = session.build_program(MARK_KERNEL).unwrap();
    let kernel = program.kernel("mark").unwrap();

    assert!(matches!(
        session.launch(&kernel, &[], &[]),
        Err(Error::InvalidDimension(0))
    ));
    assert!(matches!(
        session.launch(&kernel, &[16], &[4, 4]),
        Err(Error::DimensionMismatch { global: 1, local: 2 })
    ));
}

#[test]
fn relaxation_converges_and_is_monotone() {
    let Some(session) = test_session() else {
        println!("no OpenCL device available, skipping");
        return;
    };
    if !session.supports_fp64() {
        println!("device lacks cl_khr_fp64, skipping");
        return;
    }

    let n = 10usize;
    let heat = 100.0f64;
    let eps = 0.1f64;

    let mut first = vec![0.0f64; n];
    first[0] = heat;
    let second = first.clone();

    let program = session.build_program(RELAX_KERNEL).unwrap();
    let forward = program.kernel("relax").unwrap();
    let backward = program.kernel("relax").unwrap();

    let mut args = session
        .bind(
            &forward,
            vec![
                KernelArg::DoubleArray(first),
                KernelArg::DoubleArray(second),
                KernelArg::BoolArray(vec![false]),
                KernelArg::DoubleConst(eps),
                KernelArg::IntConst(n as u32),
            ],
        )
        .unwrap();
    args.attach_permuted(&backward, &[1, 0, 2, 3, 4]).unwrap();

    let mut iterations = 0u64;
    let final_slot = loop {
        let (kernel, dst_slot) = if iterations % 2 == 0 {
            (&forward, 1)
        } else {
            (&backward, 0)
        };
        session.run(kernel, &mut args, &[n], &[2]).unwrap();
        iterations += 1;
        if args.fetch_bools(&session, 2).unwrap()[0] {
            break dst_slot;
        }
        assert!(iterations < 100_000, "relaxation failed to converge");
    };

    let result = args.doubles(final_slot).unwrap();
    assert_eq!(result.len(), n);
    assert_eq!(result[0], heat);
    for window in result.windows(2) {
        assert!(
            window[1] <= window[0] + 1e-12,
            "vector not monotone non-increasing: {result:?}"
        );
    }
}
