//! Erase command - clears device flash.

use anyhow::Result;

use crate::config::Config;
use crate::toolchain::flash::{self, FlashRequest};

/// What to erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseTarget {
    /// The whole chip.
    All,
    Firmware,
    Application,
}

impl EraseTarget {
    pub fn request(self) -> FlashRequest {
        match self {
            EraseTarget::All => FlashRequest::EraseAll,
            EraseTarget::Firmware => FlashRequest::erase_firmware(),
            EraseTarget::Application => FlashRequest::erase_application(),
        }
    }
}

/// Execute the erase command.
pub fn cmd_erase(config: &Config, target: EraseTarget, port: Option<String>) -> Result<()> {
    let flasher = config.flasher(port);
    println!("Erasing {:?}...", target);
    flash::flash(&flasher, &target.request())?;
    println!("Erased.");
    Ok(())
}
