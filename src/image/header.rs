//! Header prologue and trailing index.

use tracing::debug;

use super::align::round_up;
use super::buffer::ImageBuf;
use super::error::{to_u32, ImageError, Result};
use super::format::{Format, Section};

/// Size of the `INDX` trailer in bytes.
pub const FOOTER_LEN: usize = 128;

/// Magic tag opening the trailer.
pub const FOOTER_MAGIC: &[u8; 4] = b"INDX";

/// Write the magic, optional version, and one absent pointer per section.
///
/// Must be called on an empty buffer.
pub fn write_header(buf: &mut ImageBuf, format: Format) {
    assert!(buf.is_empty(), "header must open the image");

    let start = buf.reserve(format.header_len());
    buf.put_bytes(start, format.magic());
    if let Some(version) = format.version() {
        buf.put_u32(start + 4, version);
    }
    for section in [Section::Mods, Section::Rofs] {
        set_section_pointer(buf, format, section, format.absent());
    }
}

/// Fill the header slot of `section`.
pub fn set_section_pointer(buf: &mut ImageBuf, format: Format, section: Section, value: u32) {
    buf.put_u32(format.slot(section), value);
}

/// Pad to a page boundary and append the trailer.
///
/// After this call `buf.len()` is a multiple of `page`, and the trailer
/// records the length of everything before it.
pub fn append_footer(buf: &mut ImageBuf, page: usize) -> Result<()> {
    if page == 0 || page % 8 != 0 {
        return Err(ImageError::InvalidAlignment { alignment: page });
    }

    let padding = round_up(buf.len() + FOOTER_LEN, page) - buf.len() - FOOTER_LEN;
    buf.reserve(padding);

    let body_len = to_u32("image", buf.len())?;
    let at = buf.reserve(FOOTER_LEN);
    buf.put_bytes(at, FOOTER_MAGIC);
    buf.put_u32(at + 4, body_len);

    debug!(padding, body_len, total = buf.len(), "appended index trailer");
    Ok(())
}
