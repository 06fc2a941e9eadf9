//! Host tools the packer drives: the script compiler, GNU binutils for
//! native modules, and the flashing utilities.
//!
//! Nothing here is needed to encode an image from ready-made payloads; the
//! image core only sees the [`ModuleLinker`](crate::image::ModuleLinker)
//! seam implemented by [`linker::GnuLinker`].

pub mod compiler;
pub mod flash;
pub mod linker;

pub use compiler::Compiler;
pub use flash::{FlashRequest, Flasher};
pub use linker::GnuLinker;
