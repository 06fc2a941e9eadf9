//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `pack` - Build an application image file
//! - `deploy` - Build an image and flash it
//! - `erase` - Erase device flash
//! - `upgrade` - Flash new firmware
//! - `preflight` - Run preflight checks
//! - `show` - Display information

pub mod deploy;
pub mod erase;
pub mod pack;
mod preflight;
pub mod show;
pub mod upgrade;

pub use deploy::cmd_deploy;
pub use erase::cmd_erase;
pub use pack::cmd_pack;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use upgrade::cmd_upgrade;
