//! End-to-end checks against a real driver; every test skips cleanly on a
//! host without an OpenCL platform.

use clkit_core::{
    DeviceMem, DeviceType, Error, EventGuard, GpuBuffer, GpuContext, GpuKernel, MemKind, Platform,
    ProgramSource,
};

const VEC_ADD: &str = r#"
__kernel void vec_add(__global const float *a,
                      __global const float *b,
                      __global float *out)
{
    size_t i = get_global_id(0);
    out[i] = a[i] + b[i];
}
"#;

const BROKEN: &str = r#"
__kernel void bad(__global float *a)
{
    a[get_global_id(0)] = undeclared_identifier;
}
"#;

fn context_or_skip() -> Option<GpuContext> {
    let platforms = Platform::all().ok()?;
    let platform = *platforms.first()?;
    GpuContext::with_fallback(platform).ok()
}

#[test]
fn enumeration_and_zero_match_queries() {
    let platforms = Platform::all().expect("platform enumeration must not fail");
    if platforms.is_empty() {
        println!("no OpenCL platform available, skipping");
        return;
    }
    for platform in platforms {
        assert!(!platform.name().unwrap().is_empty());

        // a type with no matches is an empty set, never an error
        let accelerators = platform.devices(DeviceType::Accelerator).unwrap();
        let all = platform.devices(DeviceType::All).unwrap();
        assert!(accelerators.len() <= all.len());

        for device in all {
            assert!(!device.name().unwrap().is_empty());
            assert!(device.max_compute_units().unwrap() >= 1);
        }
    }
}

#[test]
fn vec_add_round_trip() {
    let Some(ctx) = context_or_skip() else {
        println!("no OpenCL device available, skipping");
        return;
    };
    let queue = ctx.default_queue().unwrap();

    let n = 4096;
    let h_a = vec![1.5_f32; n];
    let h_b = vec![2.5_f32; n];
    let mut h_out = vec![0.0_f32; n];

    let a = GpuBuffer::from_slice(&ctx, &queue, &h_a).unwrap();
    let b = GpuBuffer::from_slice(&ctx, &queue, &h_b).unwrap();
    let out = GpuBuffer::<f32>::new(&ctx, n).unwrap();
    assert_eq!(out.mem_kind().unwrap(), MemKind::Buffer);
    assert_eq!(out.size_bytes().unwrap(), n * 4);

    let program = ProgramSource::new(VEC_ADD).build(&ctx, "").unwrap();
    let mut kernel = GpuKernel::create(&program, "vec_add").unwrap();
    assert_eq!(kernel.num_args(), 3);
    assert_eq!(kernel.function_name().unwrap(), "vec_add");

    kernel.set_mem_arg(0, &a).unwrap();
    kernel.set_mem_arg(1, &b).unwrap();
    kernel.set_mem_arg(2, &out).unwrap();

    queue
        .enqueue_kernel(&kernel, &[n], None)
        .unwrap()
        .wait()
        .unwrap();
    queue.read_blocking(&out, &mut h_out).unwrap();

    assert!(h_out.iter().all(|&x| (x - 4.0).abs() < 1e-6));
}

#[test]
fn unbound_argument_refuses_launch() {
    let Some(ctx) = context_or_skip() else {
        println!("no OpenCL device available, skipping");
        return;
    };
    let queue = ctx.default_queue().unwrap();

    let a = GpuBuffer::<f32>::new(&ctx, 16).unwrap();
    let program = ProgramSource::new(VEC_ADD).build(&ctx, "").unwrap();
    let mut kernel = GpuKernel::create(&program, "vec_add").unwrap();
    kernel.set_mem_arg(0, &a).unwrap();

    match queue.enqueue_kernel(&kernel, &[16], None) {
        Err(Error::UnsetArg { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected UnsetArg, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn broken_source_reports_a_build_log() {
    let Some(ctx) = context_or_skip() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    match ProgramSource::new(BROKEN).build(&ctx, "") {
        Err(Error::Build { code, logs }) => {
            assert_ne!(code, 0);
            assert!(
                logs.iter().any(|l| !l.log.trim().is_empty()),
                "at least one device must carry a build log"
            );
        }
        Ok(_) => panic!("broken source must not build"),
        Err(other) => panic!("expected Build error, got {other}"),
    }
}

#[test]
fn partitioned_square_tiles_the_buffer() {
    let Some(ctx) = context_or_skip() else {
        println!("no OpenCL device available, skipping");
        return;
    };
    let queues = ctx.queues().unwrap();

    let n = 512 * queues.len();
    let mut host: Vec<i32> = (0..n as i32).collect();

    let mut buffer = GpuBuffer::<i32>::new(&ctx, n).unwrap();
    queues[0].write_blocking(&mut buffer, &host).unwrap();

    let program = ProgramSource::new(
        r#"
        __kernel void square(__global int *data)
        {
            size_t i = get_global_id(0);
            data[i] = data[i] * data[i];
        }
        "#,
    )
    .build(&ctx, "")
    .unwrap();

    let views = buffer.partition(queues.len()).unwrap();
    // disjoint views, one per queue
    for (i, view) in views.iter().enumerate() {
        assert_eq!(view.region().origin, i * 512);
        assert_eq!(view.mem_kind().unwrap(), MemKind::Buffer);
    }

    let mut kernels = Vec::new();
    let mut guards = Vec::new();
    for (queue, view) in queues.iter().zip(views.iter()) {
        let mut kernel = GpuKernel::create(&program, "square").unwrap();
        kernel.set_mem_arg(0, view).unwrap();
        guards.push(
            queue
                .enqueue_kernel(&kernel, &[view.region().len], None)
                .unwrap(),
        );
        kernels.push(kernel);
    }
    EventGuard::wait_all(guards).unwrap();

    queues[0].read_blocking(&buffer, &mut host).unwrap();
    for (i, value) in host.iter().enumerate() {
        assert_eq!(*value, (i as i32) * (i as i32));
    }
}

#[test]
fn out_of_range_region_is_rejected_before_the_driver() {
    let Some(ctx) = context_or_skip() else {
        println!("no OpenCL device available, skipping");
        return;
    };

    let buffer = GpuBuffer::<f32>::new(&ctx, 64).unwrap();
    match buffer.sub_buffer(clkit_core::Region::new(32, 64)) {
        Err(Error::RegionOutOfBounds { parent: 64, .. }) => {}
        other => panic!("expected RegionOutOfBounds, got {:?}", other.map(|_| ())),
    }
}
