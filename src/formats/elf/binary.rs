//! The parsed object model.

use crate::formats::elf::relocations::Relocation;
use crate::formats::elf::sections::{find_section, Section};
use crate::formats::elf::segments::{self, Segment};
use crate::formats::elf::symbols::DynamicSymbol;
use crate::formats::elf::types::*;
use crate::formats::elf::versions::{SymbolVersion, VersionDefinition, VersionRequirement};
use serde::{Deserialize, Serialize};

/// A parsed ELF image.
///
/// Owns every table decoded from the input. The class is fixed at
/// construction; everything else is populated by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryImage {
    pub(crate) name: String,
    pub(crate) class: ElfClass,
    pub(crate) endianness: ElfData,
    pub(crate) original_size: u64,
    pub(crate) header: Option<ElfHeader>,
    pub(crate) segments: Vec<Segment>,
    pub(crate) sections: Vec<Section>,
    pub(crate) dynamic_entries: Vec<DynamicEntry>,
    pub(crate) dynamic_relocations: Vec<Relocation>,
    pub(crate) dynamic_string_table: Option<u64>,
    pub(crate) dynamic_symbols: Vec<DynamicSymbol>,
    pub(crate) symbol_versions: Vec<SymbolVersion>,
    pub(crate) version_requirements: Vec<VersionRequirement>,
    pub(crate) version_definitions: Vec<VersionDefinition>,
}

impl BinaryImage {
    pub fn new(name: impl Into<String>, class: ElfClass, endianness: ElfData, original_size: u64) -> Self {
        Self {
            name: name.into(),
            class,
            endianness,
            original_size,
            header: None,
            segments: Vec::new(),
            sections: Vec::new(),
            dynamic_entries: Vec::new(),
            dynamic_relocations: Vec::new(),
            dynamic_string_table: None,
            dynamic_symbols: Vec::new(),
            symbol_versions: Vec::new(),
            version_requirements: Vec::new(),
            version_definitions: Vec::new(),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    pub fn endianness(&self) -> ElfData {
        self.endianness
    }

    /// Size in bytes of the buffer the image was parsed from
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// File header; always present on images returned by the parser
    pub fn header(&self) -> Option<&ElfHeader> {
        self.header.as_ref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Section with the given name and type
    pub fn section(&self, name: &str, section_type: u32) -> Option<&Section> {
        find_section(&self.sections, name, section_type)
    }

    pub fn dynamic_entries(&self) -> &[DynamicEntry] {
        &self.dynamic_entries
    }

    /// Value of the first dynamic entry carrying `tag`
    pub fn dynamic_value(&self, tag: i64) -> Option<u64> {
        self.dynamic_entries
            .iter()
            .find(|e| e.d_tag == tag)
            .map(|e| e.d_val)
    }

    pub fn dynamic_relocations(&self) -> &[Relocation] {
        &self.dynamic_relocations
    }

    /// File offset of the dynamic string table; `None` when neither the
    /// dynamic segment nor a `.dynstr` section located it, in which case
    /// symbol and version names are left empty
    pub fn dynamic_string_table(&self) -> Option<u64> {
        self.dynamic_string_table
    }

    pub fn dynamic_symbols(&self) -> &[DynamicSymbol] {
        &self.dynamic_symbols
    }

    /// First dynamic symbol with the given name
    pub fn dynamic_symbol(&self, name: &str) -> Option<&DynamicSymbol> {
        self.dynamic_symbols.iter().find(|s| s.name == name)
    }

    pub fn symbol_versions(&self) -> &[SymbolVersion] {
        &self.symbol_versions
    }

    /// Version linked to `symbol`, if linking took place
    pub fn symbol_version(&self, symbol: &DynamicSymbol) -> Option<&SymbolVersion> {
        symbol
            .version_index()
            .and_then(|index| self.symbol_versions.get(index))
    }

    pub fn version_requirements(&self) -> &[VersionRequirement] {
        &self.version_requirements
    }

    pub fn version_definitions(&self) -> &[VersionDefinition] {
        &self.version_definitions
    }

    /// Translate a virtual address through the loadable segments
    pub fn virtual_address_to_offset(&self, va: u64) -> Result<u64> {
        segments::virtual_address_to_offset(&self.segments, va)
    }

    /// JSON rendering of the whole model
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
