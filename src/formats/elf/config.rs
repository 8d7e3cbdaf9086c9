//! Parser configuration.

use crate::io::IOLimits;
use serde::{Deserialize, Serialize};

/// How the number of dynamic symbols is determined.
///
/// The dynamic symbol table carries no element count of its own, so it has
/// to be derived from one of the structures that reference it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynsymCountMethod {
    /// Best agreement between the other methods
    #[default]
    Auto,
    /// Size of the `SHT_DYNSYM` section divided by the symbol size
    Section,
    /// `DT_HASH` chain count, or a walk of `DT_GNU_HASH`
    Hash,
    /// Highest symbol index referenced by a dynamic relocation, plus one
    Relocations,
}

/// Configuration for [`crate::formats::elf::Parser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Dynamic symbol counting method.
    pub dynsym_count: DynsymCountMethod,
    /// Counts at or above this value are rejected by `Auto`.
    pub max_dynamic_symbols: u32,
    /// `Auto` only accepts a larger count when it differs by less than this.
    pub symbol_count_delta: u32,
    /// Limits applied when parsing from a path.
    pub io: IOLimits,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dynsym_count: DynsymCountMethod::Auto,
            max_dynamic_symbols: 1_000_000,
            symbol_count_delta: 3_000,
            io: IOLimits::default(),
        }
    }
}
