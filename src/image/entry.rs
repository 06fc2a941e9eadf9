//! Named assets and native modules consumed by the encoder.

use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;

use super::error::{ImageError, Result};

/// Where an entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes already held in memory (e.g. compiler output).
    Memory(Vec<u8>),
    /// A file read when the encoder needs it.
    File(PathBuf),
}

/// A named asset stored in the read-only filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub payload: Payload,
}

impl Entry {
    pub fn memory(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Memory(bytes.into()),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            payload: Payload::File(path.into()),
        }
    }

    /// Name with forward-slash separators, as hashed and stored.
    pub fn normalized_name(&self) -> String {
        self.name.replace('\\', "/")
    }

    /// Read the payload.
    ///
    /// File payloads are read from disk on every call; the encoder calls
    /// this exactly once per entry.
    pub fn load(&self) -> Result<Cow<'_, [u8]>> {
        self.payload.load(&self.name)
    }
}

impl Payload {
    pub(crate) fn load(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        match self {
            Payload::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            Payload::File(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| ImageError::MissingAsset {
                    name: name.to_string(),
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// A native module: object files linked together into one binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub objects: Vec<Payload>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }
}
