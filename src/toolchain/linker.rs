//! Native module linking with GNU binutils.
//!
//! Each module is linked against the firmware's exported symbols at the
//! address it will occupy in flash, flattened to `.text` + `.rodata`, and
//! its global text symbols are read back with `nm`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::image::{LinkedModule, Module, ModuleLinker, Payload, Symbol};
use crate::process::Cmd;

/// Cross toolchain prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "arm-none-eabi-";

/// Firmware symbol table modules are linked against.
pub const DEFAULT_SYMBOL_MAP: &str = "Symbol.map";

/// Links modules in a scratch directory that lives as long as the linker.
pub struct GnuLinker {
    prefix: String,
    symbol_map: PathBuf,
    work_dir: TempDir,
}

impl GnuLinker {
    pub fn new(prefix: impl Into<String>, symbol_map: impl Into<PathBuf>) -> Result<Self> {
        let work_dir = tempfile::Builder::new()
            .prefix("ruffpack-link-")
            .tempdir()
            .context("Failed to create linker work directory")?;
        Ok(Self {
            prefix: prefix.into(),
            symbol_map: symbol_map.into(),
            work_dir,
        })
    }

    /// Full name of a binutils tool, e.g. `arm-none-eabi-ld`.
    pub fn tool(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Write in-memory objects to disk so `ld` can read them.
    fn materialize(&self, module: &Module, dir: &Path) -> Result<Vec<PathBuf>> {
        module
            .objects
            .iter()
            .enumerate()
            .map(|(i, object)| match object {
                Payload::File(path) => Ok(path.clone()),
                Payload::Memory(bytes) => {
                    let path = dir.join(format!("{}-{}.o", module.name, i));
                    fs::write(&path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    Ok(path)
                }
            })
            .collect()
    }
}

impl ModuleLinker for GnuLinker {
    fn link(&mut self, module: &Module, text_addr: u32) -> Result<LinkedModule> {
        let dir = self.work_dir.path().join(&module.name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let objects = self.materialize(module, &dir)?;
        let lib = dir.join(format!("{}.lib", module.name));
        let bin = dir.join(format!("{}.bin", module.name));
        let addr = format!("0x{:x}", text_addr);

        let mut ld = Cmd::new(self.tool("ld"))
            .arg(format!("-Ttext={}", addr))
            .arg(format!("--entry={}", addr))
            .arg(format!("--just-symbols={}", self.symbol_map.display()));
        for object in &objects {
            ld = ld.arg_path(object);
        }
        ld.arg("-o")
            .arg_path(&lib)
            .error_msg(format!("linking '{}' failed", module.name))
            .run()?;

        Cmd::new(self.tool("objcopy"))
            .args(["-j", ".text", "-j", ".rodata", "-O", "binary"])
            .arg_path(&lib)
            .arg_path(&bin)
            .error_msg(format!("objcopy of '{}' failed", module.name))
            .run()?;

        let nm = Cmd::new(self.tool("nm"))
            .arg_path(&lib)
            .error_msg(format!("reading symbols of '{}' failed", module.name))
            .run()?;

        let binary =
            fs::read(&bin).with_context(|| format!("Failed to read {}", bin.display()))?;
        let symbols = parse_nm_output(&nm.stdout_text());

        debug!(
            module = %module.name,
            text_addr = %addr,
            size = binary.len(),
            symbols = symbols.len(),
            "module linked"
        );

        Ok(LinkedModule {
            name: module.name.clone(),
            binary,
            symbols,
        })
    }
}

/// Global text symbols from `nm` output, sorted by name.
///
/// Lines that are not `<hex address> T <name>` are ignored.
pub fn parse_nm_output(output: &str) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let address = fields.next()?;
            let kind = fields.next()?;
            let name = fields.next()?;
            if kind != "T" || fields.next().is_some() {
                return None;
            }
            let address = u32::from_str_radix(address, 16).ok()?;
            Some(Symbol {
                name: name.to_string(),
                address,
            })
        })
        .collect();
    symbols.sort_by(|a, b| a.name.cmp(&b.name));
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nm_keeps_text_symbols_sorted() {
        let output = "\
00300111 T read_sensor
         U gpio_write
00300101 T dht11_init
00300200 t local_helper
00300300 D data_blob

garbage
";
        let symbols = parse_nm_output(output);
        assert_eq!(
            symbols,
            vec![
                Symbol { name: "dht11_init".into(), address: 0x30_0101 },
                Symbol { name: "read_sensor".into(), address: 0x30_0111 },
            ]
        );
    }

    #[test]
    fn test_tool_names_use_prefix() {
        let linker = GnuLinker::new(DEFAULT_PREFIX, DEFAULT_SYMBOL_MAP).unwrap();
        assert_eq!(linker.tool("ld"), "arm-none-eabi-ld");
        assert_eq!(linker.tool("objcopy"), "arm-none-eabi-objcopy");
    }

    #[test]
    fn test_memory_objects_are_written_to_work_dir() {
        let linker = GnuLinker::new("", DEFAULT_SYMBOL_MAP).unwrap();
        let module = Module {
            name: "dht11".into(),
            objects: vec![
                Payload::Memory(b"\x7fELF".to_vec()),
                Payload::File("/prebuilt/gpio.so".into()),
            ],
        };
        let dir = linker.work_dir.path().to_path_buf();

        let paths = linker.materialize(&module, &dir).unwrap();
        assert_eq!(paths[0], dir.join("dht11-0.o"));
        assert_eq!(fs::read(&paths[0]).unwrap(), b"\x7fELF");
        assert_eq!(paths[1], PathBuf::from("/prebuilt/gpio.so"));
    }
}
