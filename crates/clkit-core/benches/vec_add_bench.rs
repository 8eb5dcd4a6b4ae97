use criterion::{Criterion, criterion_group, criterion_main};

use clkit_core::{GpuBuffer, GpuContext, GpuKernel, Platform, ProgramSource};

const SRC: &str = r#"
__kernel void vec_add(__global const float *a,
                      __global const float *b,
                      __global float *out)
{
    size_t i = get_global_id(0);
    out[i] = a[i] + b[i];
}
"#;

fn bench_vec_add(c: &mut Criterion) {
    let Ok(platform) = Platform::first() else {
        eprintln!("no OpenCL platform, skipping benchmark");
        return;
    };
    let Ok(ctx) = GpuContext::with_fallback(platform) else {
        eprintln!("no usable device, skipping benchmark");
        return;
    };
    let queue = ctx.default_queue().unwrap();

    let n = 1 << 18; // 1 MiB of f32 per operand
    let h_a = vec![1.0_f32; n];
    let h_b = vec![2.0_f32; n];
    let mut h_out = vec![0.0_f32; n];

    let mut a = GpuBuffer::<f32>::new(&ctx, n).unwrap();
    let mut b = GpuBuffer::<f32>::new(&ctx, n).unwrap();
    let out = GpuBuffer::<f32>::new(&ctx, n).unwrap();

    let program = ProgramSource::new(SRC).build(&ctx, "").unwrap();
    let mut kernel = GpuKernel::create(&program, "vec_add").unwrap();
    kernel.set_mem_arg(0, &a).unwrap();
    kernel.set_mem_arg(1, &b).unwrap();
    kernel.set_mem_arg(2, &out).unwrap();

    c.bench_function("vec_add_1MiB", |bencher| {
        bencher.iter(|| {
            queue.write_blocking(&mut a, &h_a).unwrap();
            queue.write_blocking(&mut b, &h_b).unwrap();
            queue
                .enqueue_kernel(&kernel, &[n], None)
                .unwrap()
                .wait()
                .unwrap();
            queue.read_blocking(&out, &mut h_out).unwrap();
            assert!((h_out[0] - 3.0).abs() < 1e-6);
        });
    });
}

criterion_group!(benches, bench_vec_add);
criterion_main!(benches);
