//! Configuration for ruffpack.
//!
//! Values come from, in increasing precedence:
//! 1. `~/.config/ruffpack/.env` (per-user defaults)
//! 2. `.env` in the application directory
//! 3. the process environment
//!
//! Command-line flags override all of them.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::image::{Format, DEFAULT_ALIGNMENT, DEFAULT_ORIGIN};
use crate::toolchain::compiler::DEFAULT_COMPILER;
use crate::toolchain::flash::{default_port, DEFAULT_BAUD, DEFAULT_CHIP};
use crate::toolchain::linker::{DEFAULT_PREFIX, DEFAULT_SYMBOL_MAP};
use crate::toolchain::Flasher;

/// Which flashing utility drives the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlasherKind {
    #[default]
    Esptool,
    Lm4flash,
}

impl FromStr for FlasherKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "esptool" | "esptool.py" => Ok(Self::Esptool),
            "lm4flash" | "lmflash" => Ok(Self::Lm4flash),
            other => Err(format!(
                "unsupported flasher '{}' (expected 'esptool' or 'lm4flash')",
                other
            )),
        }
    }
}

impl fmt::Display for FlasherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Esptool => write!(f, "esptool"),
            Self::Lm4flash => write!(f, "lm4flash"),
        }
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Load address of the application image (`RUFF_ORIGIN`).
    pub origin: u32,
    /// Trailer page size, floored to a multiple of 8 (`RUFF_ALIGN`).
    pub alignment: usize,
    pub format: Format,
    /// Script compiler looked up on `PATH` (`RUFF_COMPILER`).
    pub compiler: String,
    /// Binutils prefix, e.g. `arm-none-eabi-` (`RUFF_TOOLCHAIN_PREFIX`).
    pub toolchain_prefix: String,
    /// Firmware symbols native modules link against (`RUFF_SYMBOL_MAP`).
    pub symbol_map: PathBuf,
    pub flasher: FlasherKind,
    pub flash_port: Option<String>,
    pub flash_baud: u32,
    pub flash_chip: String,
}

impl Config {
    /// Load configuration for the application in `base_dir`.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let mut vars = HashMap::new();

        let mut files = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            files.push(dir.join("ruffpack").join(".env"));
        }
        files.push(base_dir.join(".env"));

        for path in files.iter().filter(|p| p.is_file()) {
            debug!(path = %path.display(), "reading env file");
            let iter = dotenvy::from_path_iter(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for item in iter {
                let (key, value) =
                    item.with_context(|| format!("Invalid line in {}", path.display()))?;
                vars.insert(key, value);
            }
        }

        vars.extend(std::env::vars());
        Self::from_vars(base_dir, &vars)
    }

    /// Build configuration from a flat key/value map, applying defaults.
    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let origin = match get("RUFF_ORIGIN") {
            Some(v) => parse_number(v).with_context(|| format!("RUFF_ORIGIN={}", v))?,
            None => DEFAULT_ORIGIN,
        };

        let alignment = match get("RUFF_ALIGN") {
            Some(v) => {
                let raw = parse_number(v).with_context(|| format!("RUFF_ALIGN={}", v))?;
                floor_alignment(raw as usize)
            }
            None => DEFAULT_ALIGNMENT,
        };

        let format = match get("RUFF_FORMAT") {
            Some(v) => v.parse().map_err(anyhow::Error::msg)?,
            None => Format::default(),
        };

        let flasher = match get("RUFF_FLASHER") {
            Some(v) => v.parse().map_err(anyhow::Error::msg)?,
            None => FlasherKind::default(),
        };

        let flash_baud = match get("FLASH_BAUD") {
            Some(v) => parse_number(v).with_context(|| format!("FLASH_BAUD={}", v))?,
            None => DEFAULT_BAUD,
        };

        let symbol_map = get("RUFF_SYMBOL_MAP")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SYMBOL_MAP));
        let symbol_map = if symbol_map.is_absolute() {
            symbol_map
        } else {
            base_dir.join(symbol_map)
        };

        Ok(Self {
            origin,
            alignment,
            format,
            compiler: get("RUFF_COMPILER").unwrap_or(DEFAULT_COMPILER).to_string(),
            toolchain_prefix: vars
                .get("RUFF_TOOLCHAIN_PREFIX")
                .cloned()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            symbol_map,
            flasher,
            flash_port: get("FLASH_PORT").map(str::to_string),
            flash_baud,
            flash_chip: get("FLASH_CHIP").unwrap_or(DEFAULT_CHIP).to_string(),
        })
    }

    /// The configured flasher, with `port` overriding `FLASH_PORT`.
    pub fn flasher(&self, port: Option<String>) -> Flasher {
        match self.flasher {
            FlasherKind::Esptool => Flasher::Esptool {
                chip: self.flash_chip.clone(),
                port: port
                    .or_else(|| self.flash_port.clone())
                    .unwrap_or_else(|| default_port().to_string()),
                baud: self.flash_baud,
            },
            FlasherKind::Lm4flash => Flasher::lm4flash(),
        }
    }

    pub fn print(&self) {
        println!("Configuration:");
        println!("  RUFF_ORIGIN: {:#x}", self.origin);
        println!("  RUFF_ALIGN: {}", self.alignment);
        println!("  RUFF_FORMAT: {}", self.format);
        println!("  RUFF_COMPILER: {}", self.compiler);
        println!("  RUFF_TOOLCHAIN_PREFIX: {}", self.toolchain_prefix);
        println!("  RUFF_SYMBOL_MAP: {}", self.symbol_map.display());
        if self.symbol_map.is_file() {
            println!("  Symbol map: FOUND");
        } else {
            println!("  Symbol map: NOT FOUND (only needed for native modules)");
        }
        println!("  RUFF_FLASHER: {}", self.flasher);
        println!(
            "  FLASH_PORT: {}",
            self.flash_port.as_deref().unwrap_or(default_port())
        );
        println!("  FLASH_BAUD: {}", self.flash_baud);
        println!("  FLASH_CHIP: {}", self.flash_chip);
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_number(value: &str) -> Result<u32> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    match parsed {
        Ok(n) => Ok(n),
        Err(_) => bail!("'{}' is not a number", value),
    }
}

/// Round a page size down to a multiple of 8.
pub fn floor_alignment(alignment: usize) -> usize {
    alignment / 8 * 8
}
