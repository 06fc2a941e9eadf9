//! Deploy command - packs an application and writes it to the device.

use anyhow::{Context, Result};
use std::io::Write;

use crate::config::Config;
use crate::timing::Timer;
use crate::toolchain::flash::{self, FlashRequest};

use super::pack::{build_image, print_summary, PackOptions};

/// Execute the deploy command.
///
/// The image goes to a temporary file that is removed once the flasher
/// returns.
pub fn cmd_deploy(config: &Config, options: &PackOptions, port: Option<String>) -> Result<()> {
    let image = build_image(config, options)?;
    print_summary(&image);

    let mut file = tempfile::Builder::new()
        .prefix("ruffpack-")
        .suffix(".bin")
        .tempfile()
        .context("Failed to create temporary image file")?;
    file.write_all(image.as_bytes())
        .and_then(|_| file.flush())
        .context("Failed to write temporary image file")?;

    let origin = options.builder(config).origin;
    let flasher = config.flasher(port);
    let request = FlashRequest::WriteApplication {
        binary: file.path().to_path_buf(),
        address: origin,
        erase: false,
    };

    println!("Deploying {} bytes at {:#x}...", image.len(), origin);
    let timer = Timer::start("deploy");
    flash::flash(&flasher, &request)?;
    timer.finish();

    println!("Deployed.");
    Ok(())
}
