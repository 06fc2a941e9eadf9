//! On-disk format variants and their addressing policies.
//!
//! The two formats share one encoder. They differ in the header prologue,
//! the "section absent" sentinel, the ROFS table tag, the trailing index,
//! and how buffer offsets are turned into pointer values.

use std::fmt;
use std::str::FromStr;

use super::error::{to_u32, Result};

/// Image format variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Legacy `RUFF` image: origin-relative absolute addresses, no trailer.
    Ruff,
    /// `RAPP` image: buffer-relative offsets and a page-aligned `INDX` trailer.
    #[default]
    Rapp,
}

/// Optional sections addressed from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Mods,
    Rofs,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Mods => write!(f, "MODS"),
            Section::Rofs => write!(f, "ROFS"),
        }
    }
}

impl Format {
    pub const fn magic(self) -> &'static [u8; 4] {
        match self {
            Format::Ruff => b"RUFF",
            Format::Rapp => b"RAPP",
        }
    }

    /// Version word written after the magic, if the format carries one.
    pub const fn version(self) -> Option<u32> {
        match self {
            Format::Ruff => None,
            Format::Rapp => Some(1),
        }
    }

    /// Size of the fixed header prologue in bytes.
    pub const fn header_len(self) -> usize {
        self.pointer_base() + 4 + 4
    }

    /// Value a header pointer keeps when its section is not emitted.
    pub const fn absent(self) -> u32 {
        match self {
            Format::Ruff => 0,
            Format::Rapp => u32::MAX,
        }
    }

    /// First 16-bit word of the ROFS table header.
    pub const fn rofs_tag(self) -> u16 {
        match self {
            Format::Ruff => 1,
            Format::Rapp => 0x8000,
        }
    }

    /// Whether the image ends with page padding and an `INDX` trailer.
    pub const fn has_footer(self) -> bool {
        matches!(self, Format::Rapp)
    }

    /// Header offset of the pointer slot for `section`.
    pub const fn slot(self, section: Section) -> usize {
        match section {
            Section::Mods => self.pointer_base(),
            Section::Rofs => self.pointer_base() + 4,
        }
    }

    /// Pointer policy for an image placed at `origin`.
    pub const fn addressing(self, origin: u32) -> Addressing {
        match self {
            Format::Ruff => Addressing::Absolute { origin },
            Format::Rapp => Addressing::Relative,
        }
    }

    const fn pointer_base(self) -> usize {
        match self.version() {
            Some(_) => 8,
            None => 4,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Ruff => write!(f, "ruff"),
            Format::Rapp => write!(f, "rapp"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ruff" | "legacy" => Ok(Format::Ruff),
            "rapp" => Ok(Format::Rapp),
            other => Err(format!(
                "unsupported image format '{}' (expected 'rapp' or 'ruff')",
                other
            )),
        }
    }
}

/// How buffer offsets become pointer values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Pointers are `origin + offset`, i.e. addresses in the device map.
    Absolute { origin: u32 },
    /// Pointers are offsets; ROFS internals are relative to the ROFS table.
    Relative,
}

impl Addressing {
    /// Value stored in a header slot for a section starting at `offset`.
    pub fn header_pointer(self, offset: usize) -> Result<u32> {
        self.absolute_or(offset, offset)
    }

    /// Value stored inside the ROFS section for a target at `offset`.
    pub fn rofs_pointer(self, offset: usize, rofs_start: usize) -> Result<u32> {
        self.absolute_or(offset, offset - rofs_start)
    }

    /// Value stored inside the MODS section for a target at `offset`.
    pub fn mods_pointer(self, offset: usize) -> Result<u32> {
        self.absolute_or(offset, offset)
    }

    /// Address a native module placed at `offset` is linked against.
    pub fn link_address(self, offset: usize) -> Result<u32> {
        self.absolute_or(offset, offset)
    }

    fn absolute_or(self, offset: usize, relative: usize) -> Result<u32> {
        match self {
            Addressing::Absolute { origin } => to_u32("address", origin as usize + offset),
            Addressing::Relative => to_u32("offset", relative),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_geometry() {
        assert_eq!(Format::Ruff.header_len(), 12);
        assert_eq!(Format::Rapp.header_len(), 16);
        assert_eq!(Format::Ruff.slot(Section::Mods), 4);
        assert_eq!(Format::Ruff.slot(Section::Rofs), 8);
        assert_eq!(Format::Rapp.slot(Section::Mods), 8);
        assert_eq!(Format::Rapp.slot(Section::Rofs), 12);
    }

    #[test]
    fn test_sentinels_differ() {
        assert_eq!(Format::Ruff.absent(), 0);
        assert_eq!(Format::Rapp.absent(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_absolute_addressing_adds_origin_everywhere() {
        let a = Format::Ruff.addressing(0x30_0000);
        assert_eq!(a.header_pointer(12).unwrap(), 0x30_000C);
        assert_eq!(a.rofs_pointer(560, 12).unwrap(), 0x30_0230);
        assert_eq!(a.link_address(12).unwrap(), 0x30_000C);
    }

    #[test]
    fn test_relative_rofs_pointers_start_at_table() {
        let a = Format::Rapp.addressing(0x30_0000);
        assert_eq!(a.header_pointer(16).unwrap(), 16);
        assert_eq!(a.rofs_pointer(532, 16).unwrap(), 516);
        assert_eq!(a.mods_pointer(40).unwrap(), 40);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("rapp".parse::<Format>().unwrap(), Format::Rapp);
        assert_eq!("RUFF".parse::<Format>().unwrap(), Format::Ruff);
        assert_eq!("legacy".parse::<Format>().unwrap(), Format::Ruff);
        assert!("zip".parse::<Format>().is_err());
    }
}
