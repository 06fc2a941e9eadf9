//! Host tool availability.

use crate::config::Config;
use crate::process;

use super::types::CheckResult;

/// Compiler, binutils and flasher checks.
///
/// Binutils only matter when the application ships native modules.
pub fn check_host_tools(config: &Config, has_modules: bool) -> Vec<CheckResult> {
    let mut results = Vec::new();

    results.push(match process::which(&config.compiler) {
        Some(path) => CheckResult::pass_with(&config.compiler, path.display().to_string()),
        None => CheckResult::warn(
            &config.compiler,
            "Not found. Scripts will be shipped as source.",
        ),
    });

    for tool in ["ld", "objcopy", "nm"] {
        let name = format!("{}{}", config.toolchain_prefix, tool);
        results.push(if has_modules {
            check_tool_exists(&name, "Required to link native modules", true)
        } else {
            CheckResult::skip(&name, "no native modules")
        });
    }

    let flasher = config.flasher(None);
    results.push(check_tool_exists(
        flasher.program(),
        "Required for `ruffpack deploy`, `erase` and `upgrade`",
        false,
    ));

    results
}

fn check_tool_exists(tool: &str, purpose: &str, required: bool) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, path.display().to_string()),
        None => {
            let msg = format!("Not found in $PATH. {}", purpose);
            if required {
                CheckResult::fail(tool, msg)
            } else {
                CheckResult::warn(tool, msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;
    use std::collections::HashMap;
    use std::path::Path;

    #[test]
    fn test_binutils_skipped_without_modules() {
        let mut vars = HashMap::new();
        vars.insert("RUFF_TOOLCHAIN_PREFIX".to_string(), "nonexistent-x-".to_string());
        let config = Config::from_vars(Path::new("/app"), &vars).unwrap();

        let results = check_host_tools(&config, false);
        let ld = results.iter().find(|r| r.name == "nonexistent-x-ld").unwrap();
        assert_eq!(ld.status, CheckStatus::Skip);

        let results = check_host_tools(&config, true);
        let ld = results.iter().find(|r| r.name == "nonexistent-x-ld").unwrap();
        assert_eq!(ld.status, CheckStatus::Fail);
    }
}
