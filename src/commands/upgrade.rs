//! Upgrade command - writes new device firmware.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::timing::Timer;
use crate::toolchain::flash::{self, FlashRequest};

/// Firmware binaries for one upgrade.
#[derive(Debug, Clone)]
pub struct FirmwareFiles {
    pub bootloader: PathBuf,
    pub partition: PathBuf,
    pub app: PathBuf,
}

/// Execute the upgrade command.
pub fn cmd_upgrade(config: &Config, files: FirmwareFiles, port: Option<String>) -> Result<()> {
    for (what, path) in [
        ("bootloader", &files.bootloader),
        ("partition table", &files.partition),
        ("firmware", &files.app),
    ] {
        if !path.is_file() {
            bail!("{} binary not found: {}", what, path.display());
        }
    }

    let flasher = config.flasher(port);
    let request = FlashRequest::WriteFirmware {
        bootloader: files.bootloader,
        partition: files.partition,
        app: files.app,
    };

    println!("Upgrading firmware...");
    let timer = Timer::start("upgrade");
    flash::flash(&flasher, &request)?;
    timer.finish();

    println!("Firmware upgraded.");
    Ok(())
}
