//! Pack command - turns an application directory into an image file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{floor_alignment, Config};
use crate::image::{Format, Image, ImageBuilder, NoLinker};
use crate::manifest::{self, Manifest};
use crate::timing::Timer;
use crate::toolchain::{Compiler, GnuLinker};

/// Settings shared by `pack` and `deploy`.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub app_dir: PathBuf,
    /// JSON manifest to use instead of listing `app_dir`.
    pub manifest: Option<PathBuf>,
    pub format: Option<Format>,
    pub origin: Option<u32>,
    pub alignment: Option<usize>,
    /// Ship scripts as source instead of compiling them.
    pub source: bool,
    /// Files under `app_dir` never packed, on top of the symbol map.
    pub exclude: Vec<PathBuf>,
}

impl PackOptions {
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            ..Self::default()
        }
    }

    /// Encoder settings: flags first, then configuration.
    pub fn builder(&self, config: &Config) -> ImageBuilder {
        ImageBuilder {
            format: self.format.unwrap_or(config.format),
            origin: self.origin.unwrap_or(config.origin),
            alignment: self
                .alignment
                .map(floor_alignment)
                .unwrap_or(config.alignment),
        }
    }
}

/// Execute the pack command, returning where the image was written.
pub fn cmd_pack(config: &Config, options: &PackOptions, output: Option<&Path>) -> Result<PathBuf> {
    let path = package_path(&options.app_dir, output)?;
    let mut options = options.clone();
    options.exclude.push(path.clone());
    let image = build_image(config, &options)?;

    fs::write(&path, image.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    print_summary(&image);
    println!("Package created at \"{}\"", path.display());
    Ok(path)
}

/// Collect, classify, compile, link and encode the application.
pub fn build_image(config: &Config, options: &PackOptions) -> Result<Image> {
    let timer = Timer::start("pack");

    let manifest = match &options.manifest {
        Some(path) => Manifest::from_json(path)?,
        None => {
            let mut exclude = options.exclude.clone();
            exclude.push(config.symbol_map.clone());
            Manifest::from_dir(&options.app_dir, &exclude)?
        }
    };
    println!("Packing {} file(s) from {}", manifest.len(), options.app_dir.display());

    let compiler = Compiler::resolve(&config.compiler, !options.source);
    let plan = manifest::classify(manifest, &compiler)?;

    let builder = options.builder(config);
    debug!(?builder, "encoder settings");

    let image = if plan.modules.is_empty() {
        builder.build(&plan.entries, &[], &mut NoLinker)
    } else {
        let mut linker = GnuLinker::new(&config.toolchain_prefix, &config.symbol_map)?;
        builder.build(&plan.entries, &plan.modules, &mut linker)
    }
    .context("Failed to encode image")?;

    timer.finish();
    Ok(image)
}

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
}

/// Output path: `output`, else the `package.json` name, else the directory
/// name. `.bin` is appended unless already present.
pub fn package_path(app_dir: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let stem = match output {
        Some(path) => path.to_string_lossy().into_owned(),
        None => match package_name(app_dir)? {
            Some(name) => name,
            None => dir_name(app_dir)?,
        },
    };

    if stem.to_ascii_lowercase().ends_with(".bin") {
        Ok(PathBuf::from(stem))
    } else {
        Ok(PathBuf::from(format!("{}.bin", stem)))
    }
}

fn package_name(app_dir: &Path) -> Result<Option<String>> {
    let path = app_dir.join("package.json");
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let package: PackageJson = serde_json::from_str(&text)
        .with_context(|| format!("Invalid {}", path.display()))?;
    Ok(package.name.filter(|n| !n.trim().is_empty()))
}

fn dir_name(app_dir: &Path) -> Result<String> {
    let absolute = if app_dir.is_absolute() {
        app_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(app_dir)
    };
    absolute
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .last()
        .with_context(|| format!("Cannot derive a package name from {}", app_dir.display()))
}

/// Print size, section offsets and digest of a finished image.
pub fn print_summary(image: &Image) {
    let section = |offset: Option<usize>| match offset {
        Some(at) => format!("{:#x}", at),
        None => "absent".to_string(),
    };
    println!("  format: {}", image.format());
    println!("  size:   {} bytes", image.len());
    println!("  MODS:   {}", section(image.mods_offset()));
    println!("  ROFS:   {}", section(image.rofs_offset()));
    println!("  sha256: {}", image.sha256_hex());
}
