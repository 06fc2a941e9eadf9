//! Shared test utilities for ruffpack tests.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway application directory.
pub struct TestApp {
    /// Kept alive for the lifetime of the app.
    pub _temp_dir: TempDir,
    pub dir: PathBuf,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("app");
        fs::create_dir_all(&dir).expect("Failed to create app dir");
        Self {
            _temp_dir: temp_dir,
            dir,
        }
    }

    /// Write `content` to `name` (relative, `/`-separated) inside the app.
    pub fn write(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write app file");
        path
    }

    /// Path next to (not inside) the app directory.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }
}

/// Create an executable shell script.
pub fn create_mock_binary(path: &Path, script: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for binary");
    }
    fs::write(path, format!("#!/bin/sh\n{}\n", script)).expect("Failed to create mock binary");

    let mut perms = fs::metadata(path)
        .expect("Failed to get metadata")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

pub fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// One file recovered from an image's ROFS table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub bucket: usize,
    pub name: String,
    /// Offset of the data from the image start.
    pub data_at: usize,
    pub data: Vec<u8>,
}

/// Header fields of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
    pub magic: [u8; 4],
    pub mods: u32,
    pub rofs: u32,
}

impl DecodedHeader {
    pub fn is_rapp(&self) -> bool {
        &self.magic == b"RAPP"
    }

    pub fn absent(&self) -> u32 {
        if self.is_rapp() {
            u32::MAX
        } else {
            0
        }
    }
}

pub fn decode_header(bytes: &[u8]) -> DecodedHeader {
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let base = match &magic {
        b"RAPP" => 8,
        b"RUFF" => 4,
        other => panic!("unknown magic {:?}", other),
    };
    DecodedHeader {
        magic,
        mods: u32_at(bytes, base),
        rofs: u32_at(bytes, base + 4),
    }
}

/// Walk the ROFS bucket table the way the device loader does.
///
/// Returns `None` when the image has no ROFS section. `origin` is only used
/// for legacy images, whose pointers are absolute addresses.
pub fn decode_rofs(bytes: &[u8], origin: u32) -> Option<Vec<DecodedEntry>> {
    let header = decode_header(bytes);
    if header.rofs == header.absent() {
        return None;
    }

    let (start, to_offset): (usize, Box<dyn Fn(u32) -> usize>) = if header.is_rapp() {
        let start = header.rofs as usize;
        (start, Box::new(move |p| start + p as usize))
    } else {
        let start = (header.rofs - origin) as usize;
        (start, Box::new(move |p| (p - origin) as usize))
    };

    let bucket_count = u16_at(bytes, start + 2) as usize;
    let mut entries = Vec::new();

    for bucket in 0..bucket_count {
        let slot = start + 4 + 8 * bucket;
        let count = u32_at(bytes, slot) as usize;
        if count == 0 {
            assert_eq!(u32_at(bytes, slot + 4), 0, "empty bucket {} has a pointer", bucket);
            continue;
        }
        let first = to_offset(u32_at(bytes, slot + 4));
        for i in 0..count {
            let record = first + 12 * i;
            let name_at = to_offset(u32_at(bytes, record));
            let data_at = to_offset(u32_at(bytes, record + 4));
            let size = u32_at(bytes, record + 8) as usize;

            let name_len = bytes[name_at..]
                .iter()
                .position(|b| *b == 0)
                .expect("unterminated name");
            entries.push(DecodedEntry {
                bucket,
                name: String::from_utf8(bytes[name_at..name_at + name_len].to_vec())
                    .expect("name is not UTF-8"),
                data_at,
                data: bytes[data_at..data_at + size].to_vec(),
            });
            assert_eq!(bytes[data_at + size], 0, "data of entry is not NUL-terminated");
        }
    }
    Some(entries)
}

/// Size field of the `INDX` trailer, if the image ends with one.
pub fn decode_footer(bytes: &[u8]) -> Option<u32> {
    let at = bytes.len().checked_sub(128)?;
    if &bytes[at..at + 4] == b"INDX" {
        Some(u32_at(bytes, at + 4))
    } else {
        None
    }
}
