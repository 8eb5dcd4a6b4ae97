//! Single-device vector addition through the wrapper types.

use clkit_core::{GpuBuffer, GpuContext, GpuKernel, Platform, ProgramSource, Result};

const SRC: &str = r#"
__kernel void vec_add(__global const float *a,
                      __global const float *b,
                      __global float *out)
{
    size_t i = get_global_id(0);
    out[i] = a[i] + b[i];
}
"#;

fn main() -> Result<()> {
    let platform = match Platform::first() {
        Ok(p) => p,
        Err(_) => {
            println!("no OpenCL platform installed, nothing to do");
            return Ok(());
        }
    };
    let ctx = GpuContext::with_fallback(platform)?;
    let queue = ctx.default_queue()?;

    let n = 1 << 20;
    let h_a = vec![1.0_f32; n];
    let h_b = vec![2.0_f32; n];
    let mut h_out = vec![0.0_f32; n];

    let a = GpuBuffer::from_slice(&ctx, &queue, &h_a)?;
    let b = GpuBuffer::from_slice(&ctx, &queue, &h_b)?;
    let out = GpuBuffer::<f32>::new(&ctx, n)?;

    let program = ProgramSource::new(SRC).build(&ctx, "")?;
    let mut kernel = GpuKernel::create(&program, "vec_add")?;
    kernel.set_mem_arg(0, &a)?;
    kernel.set_mem_arg(1, &b)?;
    kernel.set_mem_arg(2, &out)?;

    queue.enqueue_kernel(&kernel, &[n], None)?.wait()?;
    queue.read_blocking(&out, &mut h_out)?;

    assert!(h_out.iter().all(|&x| (x - 3.0).abs() < 1e-6));
    println!("vec_add OK, first element = {}", h_out[0]);

    #[cfg(feature = "metrics")]
    clkit_core::summary();
    #[cfg(feature = "memtrace")]
    clkit_core::flush_csv()?;

    Ok(())
}
