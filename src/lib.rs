//! ruffpack library exports.
//!
//! The image encoder lives in [`image`]; everything else collects its
//! inputs (manifests, compiled scripts, linked modules) or moves its output
//! onto a device.

pub mod commands;
pub mod config;
pub mod image;
pub mod manifest;
pub mod preflight;
pub mod process;
pub mod timing;
pub mod toolchain;
