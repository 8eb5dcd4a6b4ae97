//! Splits one buffer into per-device sub-buffers, squares each tile on its
//! own queue, and joins on the collected events.

use clkit_core::{EventGuard, GpuBuffer, GpuContext, GpuKernel, Platform, ProgramSource, Result};

const SRC: &str = r#"
__kernel void square(__global int *data)
{
    size_t i = get_global_id(0);
    data[i] = data[i] * data[i];
}
"#;

const PER_DEVICE: usize = 1024;

fn main() -> Result<()> {
    let platform = match Platform::first() {
        Ok(p) => p,
        Err(_) => {
            println!("no OpenCL platform installed, nothing to do");
            return Ok(());
        }
    };
    let ctx = GpuContext::with_fallback(platform)?;
    let queues = ctx.queues()?;
    println!("running on {} device(s)", queues.len());

    let n = PER_DEVICE * queues.len();
    let mut host: Vec<i32> = (0..n as i32).collect();

    let mut buffer = GpuBuffer::<i32>::new(&ctx, n)?;
    queues[0].write_blocking(&mut buffer, &host)?;

    let program = ProgramSource::new(SRC).build(&ctx, "")?;

    // One disjoint tile per device, each submitted to that device's queue.
    let views = buffer.partition(queues.len())?;
    let mut kernels = Vec::new();
    let mut guards = Vec::new();
    for (queue, view) in queues.iter().zip(views.iter()) {
        let mut kernel = GpuKernel::create(&program, "square")?;
        kernel.set_mem_arg(0, view)?;
        guards.push(queue.enqueue_kernel(&kernel, &[view.region().len], None)?);
        kernels.push(kernel);
    }
    EventGuard::wait_all(guards)?;

    queues[0].read_blocking(&buffer, &mut host)?;

    for (i, value) in host.iter().enumerate() {
        let expected = (i as i32) * (i as i32);
        assert_eq!(*value, expected, "mismatch at element {i}");
    }
    for (d, tile) in host.chunks(PER_DEVICE).enumerate() {
        println!("device {d}: {} .. {}", tile[0], tile[tile.len() - 1]);
    }
    println!("all {} elements verified", n);

    Ok(())
}
