//! Linked native module section.
//!
//! ```text
//! binaries       module images, each padded to 4 bytes
//! mods_t         { count: u32 }
//! mods_module_t  { name: ptr, symbols: ptr, symbol_count: u32 }  x modules
//! mods_symbol_t  { name: ptr, address: u32 }                     x symbols
//! names          module\0 symbol\0 symbol\0 module\0 ...
//! ```
//!
//! Each module is linked at the address its binary will occupy, so linking
//! happens while the binary area is being planned. Symbol addresses carry
//! the Thumb bit.

use tracing::{debug, info};

use super::align::align4;
use super::buffer::ImageBuf;
use super::entry::Module;
use super::error::{to_u32, ImageError, Result};
use super::format::Addressing;

const COUNT_LEN: usize = 4;
const MODULE_LEN: usize = 4 + 4 + 4;
const SYMBOL_LEN: usize = 4 + 4;

/// Exported symbol of a linked module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
}

/// Output of linking one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedModule {
    pub name: String,
    /// Flat `.text` + `.rodata` image.
    pub binary: Vec<u8>,
    pub symbols: Vec<Symbol>,
}

/// Links the objects of a module at a fixed text address.
pub trait ModuleLinker {
    fn link(&mut self, module: &Module, text_addr: u32) -> anyhow::Result<LinkedModule>;
}

/// Linker for images without native modules; refuses every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLinker;

impl ModuleLinker for NoLinker {
    fn link(&mut self, module: &Module, _text_addr: u32) -> anyhow::Result<LinkedModule> {
        anyhow::bail!("no linker configured for native module '{}'", module.name)
    }
}

/// Placement of one module's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePlan {
    pub binary_at: usize,
    pub record_at: usize,
    pub name_at: usize,
    pub symbols_at: usize,
    /// `(record_at, name_at)` per symbol.
    pub symbols: Vec<(usize, usize)>,
}

/// Dry-run layout of the MODS section. All offsets are from the image start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModsPlan {
    pub start: usize,
    pub table_at: usize,
    pub modules_at: usize,
    pub symbols_at: usize,
    pub names_at: usize,
    pub end: usize,
    pub modules: Vec<ModulePlan>,
}

impl ModsPlan {
    pub fn compute(linked: &[LinkedModule], start: usize) -> Self {
        let mut binary_at = start;
        let mut binaries = Vec::with_capacity(linked.len());
        for module in linked {
            binaries.push(binary_at);
            binary_at += align4(module.binary.len());
        }

        let table_at = binary_at;
        let modules_at = table_at + COUNT_LEN;
        let symbol_total: usize = linked.iter().map(|m| m.symbols.len()).sum();
        let symbols_at = modules_at + MODULE_LEN * linked.len();
        let names_at = symbols_at + SYMBOL_LEN * symbol_total;

        let mut record = symbols_at;
        let mut name = names_at;
        let mut modules = Vec::with_capacity(linked.len());

        for (i, module) in linked.iter().enumerate() {
            let name_at = name;
            name += module.name.len() + 1;
            let first_symbol = record;

            let mut symbols = Vec::with_capacity(module.symbols.len());
            for symbol in &module.symbols {
                symbols.push((record, name));
                record += SYMBOL_LEN;
                name += symbol.name.len() + 1;
            }

            modules.push(ModulePlan {
                binary_at: binaries[i],
                record_at: modules_at + MODULE_LEN * i,
                name_at,
                symbols_at: first_symbol,
                symbols,
            });
        }

        Self {
            start,
            table_at,
            modules_at,
            symbols_at,
            names_at,
            end: name,
            modules,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Link every module in order at consecutive addresses starting at `start`.
pub fn link_modules(
    linker: &mut dyn ModuleLinker,
    addressing: Addressing,
    modules: &[Module],
    start: usize,
) -> Result<Vec<LinkedModule>> {
    let mut cursor = start;
    let mut linked = Vec::with_capacity(modules.len());

    for module in modules {
        let text_addr = addressing.link_address(cursor)?;
        info!(module = %module.name, text_addr = format_args!("{:#x}", text_addr), "linking module");

        let mut output = linker
            .link(module, text_addr)
            .map_err(|e| ImageError::Link {
                module: module.name.clone(),
                source: e.into(),
            })?;
        output.symbols.sort_by(|a, b| a.name.cmp(&b.name));

        cursor += align4(output.binary.len());
        linked.push(output);
    }
    Ok(linked)
}

/// Link and append the MODS section, returning the offset of `mods_t`.
///
/// Returns `None` without touching the buffer when there are no modules.
pub fn append_mods(
    buf: &mut ImageBuf,
    addressing: Addressing,
    modules: &[Module],
    linker: &mut dyn ModuleLinker,
) -> Result<Option<usize>> {
    if modules.is_empty() {
        return Ok(None);
    }

    let linked = link_modules(linker, addressing, modules, buf.len())?;
    let plan = ModsPlan::compute(&linked, buf.len());

    let start = buf.reserve(plan.len());
    assert_eq!(start, plan.start, "MODS plan computed for a different offset");

    buf.put_u32(plan.table_at, to_u32("module count", linked.len())?);

    for (module, placed) in linked.iter().zip(&plan.modules) {
        buf.put_bytes(placed.binary_at, &module.binary);

        buf.put_bytes(placed.name_at, module.name.as_bytes());
        buf.put_u32(placed.record_at, addressing.mods_pointer(placed.name_at)?);
        buf.put_u32(placed.record_at + 4, addressing.mods_pointer(placed.symbols_at)?);
        buf.put_u32(placed.record_at + 8, to_u32("symbol count", module.symbols.len())?);

        for (symbol, &(record_at, name_at)) in module.symbols.iter().zip(&placed.symbols) {
            buf.put_bytes(name_at, symbol.name.as_bytes());
            buf.put_u32(record_at, addressing.mods_pointer(name_at)?);
            buf.put_u32(record_at + 4, symbol.address | 1);
        }
    }

    assert_eq!(buf.len(), plan.end, "MODS section overran its plan");

    debug!(
        start,
        table_at = plan.table_at,
        len = plan.len(),
        modules = linked.len(),
        "appended MODS section"
    );
    Ok(Some(plan.table_at))
}
