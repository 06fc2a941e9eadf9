//! Script compiler front end.
//!
//! Scripts and JSON documents are wrapped into a self-invoking function
//! before compilation so the device runtime can evaluate every asset the
//! same way. The compiler gets the entry name as its only argument and the
//! wrapped source on stdin; whatever it prints is the payload.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::process::{self, Cmd};

/// Compiler looked up on `PATH` when none is configured.
pub const DEFAULT_COMPILER: &str = "ruff-compiler";

/// A resolved compiler, or the decision to ship sources unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiler {
    name: String,
    program: Option<PathBuf>,
}

impl Compiler {
    /// Decide once whether scripts are compiled for this build.
    ///
    /// A compiler that cannot be found is not an error: a warning is logged
    /// and every script is shipped as source.
    pub fn resolve(name: &str, to_compile: bool) -> Self {
        if !to_compile {
            debug!(compiler = name, "compilation disabled");
            return Self::disabled(name);
        }
        match process::which(name) {
            Some(program) => {
                debug!(compiler = name, path = %program.display(), "compiler found");
                Self {
                    name: name.to_string(),
                    program: Some(program),
                }
            }
            None => {
                warn!(
                    "Could not find \"{}\" in $PATH, fallback to source code.",
                    name
                );
                Self::disabled(name)
            }
        }
    }

    /// Ship every script as source.
    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            program: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.program.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile a script module.
    pub fn compile_script(&self, entry: &str, source: &[u8]) -> Result<Vec<u8>> {
        self.run(entry, wrap_script(source))
    }

    /// Compile a JSON document into an expression returning it.
    pub fn compile_json(&self, entry: &str, source: &[u8]) -> Result<Vec<u8>> {
        self.run(entry, wrap_json(source))
    }

    fn run(&self, entry: &str, wrapped: Vec<u8>) -> Result<Vec<u8>> {
        let Some(program) = self.program.as_ref() else {
            bail!("compiler '{}' is not active", self.name);
        };

        let result = Cmd::new(program.to_string_lossy())
            .arg(entry)
            .stdin(wrapped)
            .error_msg(format!("{} failed to compile '{}'", self.name, entry))
            .run()?;

        debug!(entry, len = result.stdout.len(), "compiled");
        Ok(result.stdout)
    }
}

/// Wrap a script in a module factory.
pub fn wrap_script(source: &[u8]) -> Vec<u8> {
    const HEAD: &[u8] =
        b"(function(){return function(exports,require,module,__filename,__dirname){";
    const TAIL: &[u8] = b"\n}})();";

    let mut out = Vec::with_capacity(HEAD.len() + source.len() + TAIL.len());
    out.extend_from_slice(HEAD);
    out.extend_from_slice(source);
    out.extend_from_slice(TAIL);
    out
}

/// Wrap a JSON document, trimmed, in an expression returning it.
pub fn wrap_json(source: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(source);
    format!("(function(){{return {};}})();", text.trim()).into_bytes()
}
