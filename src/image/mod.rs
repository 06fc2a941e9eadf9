//! Image encoder.
//!
//! An image is a header, an optional MODS section of linked native modules,
//! an optional ROFS section holding the application's assets, and (for the
//! RAPP format) page padding plus an `INDX` trailer:
//!
//! ```text
//! +--------+------------+-------------------+---------+--------+
//! | header | MODS (opt) | ROFS (opt)        | padding | INDX   |
//! +--------+------------+-------------------+---------+--------+
//!                                             RAPP only
//! ```
//!
//! Encoding is a pure function of the entries (content and order), the
//! modules, the origin and the page size.

pub mod align;
pub mod buffer;
pub mod entry;
pub mod error;
pub mod format;
pub mod hash;
pub mod header;
pub mod mods;
pub mod rofs;

use sha2::{Digest, Sha256};
use tracing::info;

pub use entry::{Entry, Module, Payload};
pub use error::{ImageError, Result};
pub use format::{Addressing, Format, Section};
pub use mods::{LinkedModule, ModuleLinker, NoLinker, Symbol};

use buffer::ImageBuf;

/// Required alignment of the origin address.
pub const ORIGIN_ALIGNMENT: u32 = 4096;

/// Default load address of the application partition.
pub const DEFAULT_ORIGIN: u32 = 0x30_0000;

/// Default page size for the trailer.
pub const DEFAULT_ALIGNMENT: usize = 4096;

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBuilder {
    pub format: Format,
    pub origin: u32,
    pub alignment: usize,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self {
            format: Format::default(),
            origin: DEFAULT_ORIGIN,
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl ImageBuilder {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn origin(mut self, origin: u32) -> Self {
        self.origin = origin;
        self
    }

    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Encode a complete image.
    ///
    /// Preconditions are checked before any byte is produced. Modules are
    /// handed to `linker` in order, each at the address its binary will
    /// occupy.
    pub fn build(
        &self,
        entries: &[Entry],
        modules: &[Module],
        linker: &mut dyn ModuleLinker,
    ) -> Result<Image> {
        if self.origin % ORIGIN_ALIGNMENT != 0 {
            return Err(ImageError::UnalignedOrigin {
                origin: self.origin,
            });
        }
        if self.format.has_footer() && (self.alignment == 0 || self.alignment % 8 != 0) {
            return Err(ImageError::InvalidAlignment {
                alignment: self.alignment,
            });
        }

        let format = self.format;
        let addressing = format.addressing(self.origin);
        let mut buf = ImageBuf::new();
        header::write_header(&mut buf, format);

        let mods = mods::append_mods(&mut buf, addressing, modules, linker)?;
        if let Some(offset) = mods {
            header::set_section_pointer(
                &mut buf,
                format,
                Section::Mods,
                addressing.header_pointer(offset)?,
            );
        }

        let rofs = rofs::append_rofs(&mut buf, format, addressing, entries)?;
        if let Some(offset) = rofs {
            header::set_section_pointer(
                &mut buf,
                format,
                Section::Rofs,
                addressing.header_pointer(offset)?,
            );
        }

        if format.has_footer() {
            header::append_footer(&mut buf, self.alignment)?;
        }

        info!(
            %format,
            origin = format_args!("{:#x}", self.origin),
            entries = entries.len(),
            modules = modules.len(),
            len = buf.len(),
            "image encoded"
        );

        Ok(Image {
            format,
            mods,
            rofs,
            bytes: buf.into_vec(),
        })
    }
}

/// A finished image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    format: Format,
    mods: Option<usize>,
    rofs: Option<usize>,
    bytes: Vec<u8>,
}

impl Image {
    pub fn format(&self) -> Format {
        self.format
    }

    /// Buffer offset of the MODS table, if emitted.
    pub fn mods_offset(&self) -> Option<usize> {
        self.mods
    }

    /// Buffer offset of the ROFS table, if emitted.
    pub fn rofs_offset(&self) -> Option<usize> {
        self.rofs
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex SHA-256 of the image bytes.
    pub fn sha256_hex(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_entries() -> Vec<Entry> {
        vec![Entry::memory("a.js", "1"), Entry::memory("b/c.json", "{}")]
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_rapp_scenario_fills_one_page() {
        let image = ImageBuilder::new(Format::Rapp)
            .build(&two_entries(), &[], &mut NoLinker)
            .unwrap();
        let bytes = image.as_bytes();

        assert_eq!(image.len(), 4096);
        assert_eq!(u32_at(bytes, 8), u32::MAX);
        assert_eq!(u32_at(bytes, 12), 16);
        assert_eq!(&bytes[3968..3972], b"INDX");
        assert_eq!(u32_at(bytes, 3972), 3968);
        assert_eq!(image.rofs_offset(), Some(16));
    }

    #[test]
    fn test_ruff_scenario_uses_absolute_pointers() {
        let image = ImageBuilder::new(Format::Ruff)
            .origin(0x30_0000)
            .build(&two_entries(), &[], &mut NoLinker)
            .unwrap();
        let bytes = image.as_bytes();

        assert_eq!(image.len(), 579);
        assert_eq!(u32_at(bytes, 4), 0);
        assert_eq!(u32_at(bytes, 8), 0x30_000C);
        assert_eq!(&bytes[12..14], &1u16.to_le_bytes());
        // a.js record: name at 552, data at 560
        assert_eq!(u32_at(bytes, 528), 0x30_0000 + 552);
        assert_eq!(u32_at(bytes, 532), 0x30_0000 + 560);
    }

    #[test]
    fn test_unaligned_origin_is_rejected() {
        let err = ImageBuilder::new(Format::Ruff)
            .origin(0x30_0001)
            .build(&two_entries(), &[], &mut NoLinker)
            .unwrap_err();
        assert!(matches!(err, ImageError::UnalignedOrigin { origin: 0x30_0001 }));
    }

    #[test]
    fn test_empty_image_keeps_sentinels() {
        let image = ImageBuilder::new(Format::Rapp)
            .build(&[], &[], &mut NoLinker)
            .unwrap();
        assert_eq!(image.len(), 4096);
        assert_eq!(u32_at(image.as_bytes(), 8), u32::MAX);
        assert_eq!(u32_at(image.as_bytes(), 12), u32::MAX);
        assert_eq!(u32_at(image.as_bytes(), 3972), 16);
    }

    #[test]
    fn test_digest_is_stable() {
        let build = || {
            ImageBuilder::default()
                .build(&two_entries(), &[], &mut NoLinker)
                .unwrap()
        };
        assert_eq!(build().sha256_hex(), build().sha256_hex());
        assert_eq!(build().sha256_hex().len(), 64);
    }
}
