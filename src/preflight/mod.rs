//! Preflight checks for packing and flashing.
//!
//! Verifies host tools and image settings before anything is built.
//! Run with `ruffpack preflight` to see what an application needs.

mod environment;
mod host_tools;
mod types;

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::manifest::Manifest;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks for the application in `app_dir`.
pub fn run_preflight(config: &Config, app_dir: &Path) -> PreflightReport {
    let has_modules = has_native_modules(app_dir);
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools(config, has_modules));

    println!("Checking image settings...");
    checks.extend(environment::check_environment(config, app_dir, has_modules));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any check fails.
pub fn run_preflight_or_fail(config: &Config, app_dir: &Path) -> Result<()> {
    let report = run_preflight(config, app_dir);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before packing.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}

fn has_native_modules(app_dir: &Path) -> bool {
    Manifest::from_dir(app_dir, &[])
        .map(|m| m.entries.iter().any(|e| e.name.ends_with(".so")))
        .unwrap_or(false)
}
