//! Error taxonomy for image encoding.
//!
//! Every variant here is caller-visible and aborts the whole encode. Layout
//! disagreements between a dry-run plan and the bytes actually written are
//! encoder bugs and are asserted instead.

use std::io;
use std::path::PathBuf;

/// Errors raised while building an image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The origin address is not 4K aligned.
    #[error("app origin must be 4k aligned, got {origin:#x}")]
    UnalignedOrigin { origin: u32 },

    /// The page size used for the trailing index is unusable.
    #[error("invalid alignment {alignment}: must be a non-zero multiple of 8")]
    InvalidAlignment { alignment: usize },

    /// A manifest entry points at a file that cannot be read.
    #[error("cannot read asset '{name}' from '{}'", path.display())]
    MissingAsset {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external linker failed for a native module.
    #[error("failed to link module '{module}'")]
    Link {
        module: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// An offset or size does not fit the 32-bit pointer fields.
    #[error("{what} of {size} bytes does not fit a 32-bit image field")]
    TooLarge { what: &'static str, size: usize },
}

pub type Result<T> = std::result::Result<T, ImageError>;

/// Convert a buffer quantity into a 32-bit field value.
pub(crate) fn to_u32(what: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| ImageError::TooLarge { what, size: value })
}
