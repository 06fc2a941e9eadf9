//! Application manifests and their classification into image inputs.
//!
//! A manifest is the ordered list of files making up an application. Order
//! matters: it decides where entries land in the image, so every source of
//! manifests here is deterministic.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::image::{Entry, Module, Payload};
use crate::toolchain::Compiler;

/// Directory whose children are native module packages.
pub const MODULES_DIR: &str = "ruff_modules";

/// Ordered application files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct ManifestItem {
    name: String,
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    content: Option<String>,
}

impl Manifest {
    /// Load a JSON manifest: `[{ "name": ..., "source": ... | "content": ... }]`.
    ///
    /// `content` wins over `source`. Relative sources resolve against the
    /// manifest's directory.
    pub fn from_json(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let items: Vec<ManifestItem> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let entries = items
            .into_iter()
            .map(|item| match (item.content, item.source) {
                (Some(content), _) => Ok(Entry::memory(item.name, content)),
                (None, Some(source)) => Ok(Entry::file(item.name, base.join(source))),
                (None, None) => bail!("manifest entry '{}' has neither source nor content", item.name),
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(path = %path.display(), entries = entries.len(), "loaded manifest");
        Ok(Self { entries })
    }

    /// List every file under `root`, sorted, skipping dot-files and
    /// dot-directories. Names are relative to `root` with `/` separators.
    ///
    /// Packer artifacts never become entries: `*.bin` images at the top
    /// level and any path in `exclude` (output image, symbol map) are left
    /// out so repacking an unchanged app yields the same image.
    pub fn from_dir(root: &Path, exclude: &[PathBuf]) -> Result<Self> {
        if !root.is_dir() {
            bail!("Application directory not found: {}", root.display());
        }

        let excluded: Vec<PathBuf> = exclude
            .iter()
            .filter_map(|p| fs::canonicalize(p).ok())
            .collect();

        let mut entries = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for dirent in walker {
            let dirent = dirent.with_context(|| format!("Failed to walk {}", root.display()))?;
            if !dirent.file_type().is_file() {
                continue;
            }
            if dirent.depth() == 1 && is_image(dirent.file_name()) {
                debug!(path = %dirent.path().display(), "skipping image file");
                continue;
            }
            if !excluded.is_empty()
                && fs::canonicalize(dirent.path()).is_ok_and(|p| excluded.contains(&p))
            {
                debug!(path = %dirent.path().display(), "skipping excluded file");
                continue;
            }
            let relative = dirent
                .path()
                .strip_prefix(root)
                .with_context(|| format!("{} escaped {}", dirent.path().display(), root.display()))?;
            entries.push(Entry::file(entry_name(relative), dirent.path()));
        }

        debug!(root = %root.display(), entries = entries.len(), "listed application");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_image(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().to_ascii_lowercase().ends_with(".bin")
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Module a native object belongs to: the nearest ancestor directory whose
/// parent is named `ruff_modules`.
pub fn module_key(name: &str) -> Result<String> {
    let parts: Vec<&str> = name
        .split(['/', '\\'])
        .filter(|p| !p.is_empty())
        .collect();

    // Skip the file itself; search its directories innermost first.
    let dirs = parts.len().saturating_sub(1);
    (1..dirs)
        .rev()
        .find(|&i| parts[i - 1] == MODULES_DIR)
        .map(|i| parts[i].to_string())
        .with_context(|| format!("native object '{}' is not inside {}/<module>/", name, MODULES_DIR))
}

/// Image inputs after classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackPlan {
    pub entries: Vec<Entry>,
    pub modules: Vec<Module>,
}

/// Split a manifest into filesystem entries and native modules.
///
/// `.so` objects are grouped into modules in order of first appearance.
/// Scripts and JSON documents go through `compiler` when it is active;
/// everything else is stored verbatim.
pub fn classify(manifest: Manifest, compiler: &Compiler) -> Result<PackPlan> {
    let mut plan = PackPlan::default();

    for entry in manifest.entries {
        let ext = extension(&entry.name).map(str::to_string);
        match ext.as_deref() {
            Some("so") => {
                let key = module_key(&entry.name)?;
                match plan.modules.iter_mut().find(|m| m.name == key) {
                    Some(module) => module.objects.push(entry.payload),
                    None => plan.modules.push(Module {
                        name: key,
                        objects: vec![entry.payload],
                    }),
                }
            }
            Some(ext @ ("js" | "json")) if compiler.is_active() => {
                let source = entry.load()?;
                let compiled = if ext == "js" {
                    compiler.compile_script(&entry.name, &source)?
                } else {
                    compiler.compile_json(&entry.name, &source)?
                };
                drop(source);
                plan.entries.push(Entry {
                    name: entry.name,
                    payload: Payload::Memory(compiled),
                });
            }
            _ => plan.entries.push(entry),
        }
    }

    info!(
        entries = plan.entries.len(),
        modules = plan.modules.len(),
        compiled = compiler.is_active(),
        "classified manifest"
    );
    Ok(plan)
}

fn extension(name: &str) -> Option<&str> {
    let file = name.rsplit(['/', '\\']).next()?;
    match file.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(&file[dot + 1..]),
    }
}
