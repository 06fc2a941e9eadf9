//! Flashing images to a device.
//!
//! Requests are independent of the tool that carries them out; each
//! [`Flasher`] turns a request into its own ordered argument list.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::info;

use crate::process::{self, Cmd};

/// Flash range holding the firmware.
pub const FIRMWARE_REGION: (u32, u32) = (0x0, 0x30_0000);
/// Flash range holding the application image.
pub const APPLICATION_REGION: (u32, u32) = (0x30_0000, 0x10_0000);

pub const BOOTLOADER_ADDRESS: u32 = 0x1000;
pub const PARTITION_TABLE_ADDRESS: u32 = 0x8000;
pub const FIRMWARE_APP_ADDRESS: u32 = 0x1_0000;

pub const DEFAULT_CHIP: &str = "esp32";
pub const DEFAULT_BAUD: u32 = 200_000;

/// One operation on the device flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashRequest {
    EraseAll,
    EraseRegion {
        address: u32,
        size: u32,
    },
    /// Bootloader, partition table and firmware application.
    WriteFirmware {
        bootloader: PathBuf,
        partition: PathBuf,
        app: PathBuf,
    },
    /// A packed application image.
    WriteApplication {
        binary: PathBuf,
        address: u32,
        /// Erase the whole chip first.
        erase: bool,
    },
}

impl FlashRequest {
    pub fn erase_firmware() -> Self {
        let (address, size) = FIRMWARE_REGION;
        Self::EraseRegion { address, size }
    }

    pub fn erase_application() -> Self {
        let (address, size) = APPLICATION_REGION;
        Self::EraseRegion { address, size }
    }
}

/// Flash utility and its connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flasher {
    /// Espressif `esptool.py` over a serial port.
    Esptool {
        chip: String,
        port: String,
        baud: u32,
    },
    /// TI Stellaris ICDI tools (`lm4flash`, `LMFlash.exe` on Windows).
    Lm4flash { windows: bool },
}

impl Flasher {
    /// esptool on the default port of this host.
    pub fn esptool(port: Option<String>) -> Self {
        Self::Esptool {
            chip: DEFAULT_CHIP.to_string(),
            port: port.unwrap_or_else(|| default_port().to_string()),
            baud: DEFAULT_BAUD,
        }
    }

    pub fn lm4flash() -> Self {
        Self::Lm4flash {
            windows: cfg!(windows),
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Flasher::Esptool { .. } => "esptool.py",
            Flasher::Lm4flash { windows: false } => "lm4flash",
            Flasher::Lm4flash { windows: true } => "LMFlash.exe",
        }
    }

    /// Arguments carrying out `request`, in order.
    pub fn args(&self, request: &FlashRequest) -> Result<Vec<String>> {
        match self {
            Flasher::Esptool { chip, port, baud } => {
                let mut args = vec![
                    "--chip".to_string(),
                    chip.clone(),
                    "--port".to_string(),
                    port.clone(),
                    "--baud".to_string(),
                    baud.to_string(),
                ];
                esptool_command(&mut args, request);
                Ok(args)
            }
            Flasher::Lm4flash { windows } => {
                let FlashRequest::WriteApplication {
                    binary,
                    address,
                    erase,
                } = request
                else {
                    bail!("{} can only write application images", self.program());
                };
                let binary = binary.display().to_string();
                let address = hex(*address);

                let mut args = Vec::new();
                if *windows {
                    if *erase {
                        args.extend(["-e".to_string(), "all".to_string()]);
                    }
                    args.extend([
                        "-r".to_string(),
                        "-i".to_string(),
                        "ICDI".to_string(),
                        "-o".to_string(),
                        address,
                        binary,
                    ]);
                } else {
                    if !*erase {
                        args.extend(["-S".to_string(), address]);
                    }
                    args.push(binary);
                }
                Ok(args)
            }
        }
    }
}

fn esptool_command(args: &mut Vec<String>, request: &FlashRequest) {
    let write_flash = |args: &mut Vec<String>| {
        args.extend(
            [
                "write_flash",
                "--flash_mode",
                "dio",
                "--flash_freq",
                "40m",
                "--flash_size",
                "4MB",
            ]
            .map(String::from),
        );
    };

    match request {
        FlashRequest::EraseAll => args.push("erase_flash".to_string()),
        FlashRequest::EraseRegion { address, size } => {
            args.extend(["erase_region".to_string(), hex(*address), hex(*size)]);
        }
        FlashRequest::WriteFirmware {
            bootloader,
            partition,
            app,
        } => {
            write_flash(args);
            for (address, binary) in [
                (BOOTLOADER_ADDRESS, bootloader),
                (PARTITION_TABLE_ADDRESS, partition),
                (FIRMWARE_APP_ADDRESS, app),
            ] {
                args.extend([hex(address), binary.display().to_string()]);
            }
        }
        FlashRequest::WriteApplication {
            binary,
            address,
            erase,
        } => {
            write_flash(args);
            if *erase {
                args.push("--erase-all".to_string());
            }
            args.extend([hex(*address), binary.display().to_string()]);
        }
    }
}

fn hex(value: u32) -> String {
    format!("0x{:x}", value)
}

/// Serial port of the USB-UART bridge on this host.
pub fn default_port() -> &'static str {
    default_port_for(std::env::consts::OS)
}

pub fn default_port_for(os: &str) -> &'static str {
    match os {
        "macos" => "/dev/cu.SLAB_USBtoUART",
        "windows" => "COM1",
        _ => "/dev/ttyUSB0",
    }
}

/// Run the flasher with the terminal attached so its progress is visible.
pub fn flash(flasher: &Flasher, request: &FlashRequest) -> Result<()> {
    let program = flasher.program();
    let Some(path) = process::which(program) else {
        bail!(
            "Could not find \"{}\" in $PATH, please install it first.",
            program
        );
    };
    let args = flasher.args(request)?;

    info!(tool = program, ?request, "flashing");
    Cmd::new(path.to_string_lossy())
        .args(&args)
        .error_msg(format!("{} failed", program))
        .run_interactive()?;
    Ok(())
}
