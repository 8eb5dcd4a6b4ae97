//! Lists every installed platform and its devices.

use clkit_core::{DeviceType, Platform, Result};

fn main() -> Result<()> {
    let platforms = Platform::all()?;
    if platforms.is_empty() {
        println!("no OpenCL platform installed");
        return Ok(());
    }

    for platform in &platforms {
        println!("platform {platform}");
        println!("  profile:  {}", platform.profile()?);
        println!("  version:  {}", platform.version()?);

        for device in platform.devices(DeviceType::All)? {
            println!("  device {device}");
            println!("    compute units:  {}", device.max_compute_units()?);
            println!("    max work group: {}", device.max_work_group_size()?);
            println!(
                "    global memory:  {} MiB",
                device.global_mem_size()? / (1024 * 1024)
            );
        }
    }

    Ok(())
}
