//! Image settings and application layout checks.

use std::path::Path;

use crate::config::Config;
use crate::image::ORIGIN_ALIGNMENT;
use crate::manifest::MODULES_DIR;

use super::types::CheckResult;

pub fn check_environment(config: &Config, app_dir: &Path, has_modules: bool) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if app_dir.is_dir() {
        results.push(CheckResult::pass_with(
            "application directory",
            app_dir.display().to_string(),
        ));
    } else {
        results.push(CheckResult::fail(
            "application directory",
            format!("{} does not exist", app_dir.display()),
        ));
    }

    if app_dir.join("package.json").is_file() {
        results.push(CheckResult::pass("package.json"));
    } else {
        results.push(CheckResult::warn(
            "package.json",
            "Not found. Package name falls back to the directory name.",
        ));
    }

    if config.origin % ORIGIN_ALIGNMENT == 0 {
        results.push(CheckResult::pass_with(
            "origin alignment",
            format!("{:#x}", config.origin),
        ));
    } else {
        results.push(CheckResult::fail(
            "origin alignment",
            format!("{:#x} is not 4k aligned", config.origin),
        ));
    }

    if config.alignment == 0 {
        results.push(CheckResult::fail(
            "page alignment",
            "RUFF_ALIGN must be at least 8",
        ));
    } else {
        results.push(CheckResult::pass_with(
            "page alignment",
            config.alignment.to_string(),
        ));
    }

    if !has_modules {
        results.push(CheckResult::skip(
            "symbol map",
            format!("no {}/ packages with native objects", MODULES_DIR),
        ));
    } else if config.symbol_map.is_file() {
        results.push(CheckResult::pass_with(
            "symbol map",
            config.symbol_map.display().to_string(),
        ));
    } else {
        results.push(CheckResult::fail(
            "symbol map",
            format!(
                "{} not found. Set RUFF_SYMBOL_MAP to the firmware's Symbol.map",
                config.symbol_map.display()
            ),
        ));
    }

    results
}
