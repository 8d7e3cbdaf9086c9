//! Symbol versioning: the `DT_VERSYM` array, its linkage to dynamic symbols,
//! and the requirement / definition records that name each version index.

use crate::formats::elf::binary::BinaryImage;
use crate::formats::elf::sections::find_section_by_type;
use crate::formats::elf::segments::virtual_address_to_offset;
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Upper bound on records walked in a version requirement/definition chain
pub const MAX_VERSION_RECORDS: u64 = 4096;

/// Meaning of a version array entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionKind {
    /// `VER_NDX_LOCAL`: the symbol is not available outside the object
    Local,
    /// `VER_NDX_GLOBAL`: the symbol is unversioned
    Global,
    /// Index of a version requirement or definition
    Index(u16),
}

/// One entry of the version array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolVersion {
    /// Raw 16-bit value, hidden bit included
    pub value: u16,
    /// Version name, when a requirement or definition carries this index
    pub name: Option<String>,
}

impl SymbolVersion {
    pub fn new(value: u16) -> Self {
        Self { value, name: None }
    }

    /// Version index with the hidden bit cleared
    pub fn index(&self) -> u16 {
        self.value & VERSYM_VERSION
    }

    pub fn is_hidden(&self) -> bool {
        (self.value & VERSYM_HIDDEN) != 0
    }

    pub fn kind(&self) -> VersionKind {
        match self.index() {
            VER_NDX_LOCAL => VersionKind::Local,
            VER_NDX_GLOBAL => VersionKind::Global,
            index => VersionKind::Index(index),
        }
    }
}

/// `Vernaux` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequirementAux {
    pub hash: u32,
    pub flags: u16,
    /// Version index referenced from the version array
    pub other: u16,
    pub name: String,
}

/// `Verneed` record: versions required from one shared object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequirement {
    pub version: u16,
    pub file: String,
    pub auxiliaries: Vec<VersionRequirementAux>,
}

/// `Verdef` record: a version defined by this object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDefinition {
    pub version: u16,
    pub flags: u16,
    pub index: u16,
    pub hash: u32,
    /// Version name first, then its parents
    pub names: Vec<String>,
}

/// File offset of the version array: `DT_VERSYM`, then the `SHT_GNU_VERSYM`
/// section.
pub fn version_table_offset(image: &BinaryImage) -> Option<u64> {
    if let Some(addr) = image.dynamic_value(DT_VERSYM) {
        match virtual_address_to_offset(image.segments(), addr) {
            Ok(offset) => return Some(offset),
            Err(e) => debug!(error = %e, "DT_VERSYM unmapped, trying .gnu.version"),
        }
    }
    find_section_by_type(image.sections(), SHT_GNU_VERSYM).map(|s| s.file_offset)
}

/// Read one 16-bit version entry per dynamic symbol, starting at `offset`.
///
/// The whole range is checked before anything is appended, so a failing read
/// leaves the image untouched.
pub fn read_versions(image: &mut BinaryImage, stream: &ByteStream<'_>, offset: u64) -> Result<()> {
    let count = image.dynamic_symbols.len() as u64;
    debug!(offset, count, "Parsing symbol versions");

    let array = stream.slice(offset, count * 2)?;
    let mut versions = Vec::with_capacity(count as usize);
    for i in 0..count {
        versions.push(SymbolVersion::new(array.read_u16(i * 2)?));
    }
    image.symbol_versions.extend(versions);
    Ok(())
}

/// Link every dynamic symbol to the version at the same index.
///
/// Linking only happens when both sequences have the same length; otherwise
/// no symbol receives a version. Returns whether linking happened.
pub fn link_versions(image: &mut BinaryImage) -> bool {
    let symbols = image.dynamic_symbols.len();
    let versions = image.symbol_versions.len();
    if symbols != versions {
        if versions > 0 {
            warn!(symbols, versions, "Symbol/version count mismatch, versions left unlinked");
        }
        for symbol in image.dynamic_symbols.iter_mut() {
            symbol.version = None;
        }
        return false;
    }

    for (i, symbol) in image.dynamic_symbols.iter_mut().enumerate() {
        symbol.version = Some(i);
    }
    true
}

/// Decode the `DT_VERNEED` chain
pub fn parse_version_requirements(
    image: &BinaryImage,
    stream: &ByteStream<'_>,
    strings: Option<&ByteStream<'_>>,
) -> Vec<VersionRequirement> {
    let mut out = Vec::new();
    let Some(addr) = image.dynamic_value(DT_VERNEED) else {
        return out;
    };
    let count = image
        .dynamic_value(DT_VERNEEDNUM)
        .unwrap_or(0)
        .min(MAX_VERSION_RECORDS);

    let walk = virtual_address_to_offset(image.segments(), addr)
        .and_then(|offset| walk_requirements(stream, strings, offset, count, &mut out));
    if let Err(e) = walk {
        warn!(error = %e, parsed = out.len(), "Version requirements truncated");
    }
    out
}

fn walk_requirements(
    stream: &ByteStream<'_>,
    strings: Option<&ByteStream<'_>>,
    mut offset: u64,
    count: u64,
    out: &mut Vec<VersionRequirement>,
) -> Result<()> {
    for _ in 0..count {
        let raw = stream.slice(offset, 16)?;
        let vn_cnt = raw.read_u16(2)? as u64;
        let vn_aux = raw.read_u32(8)? as u64;
        let vn_next = raw.read_u32(12)? as u64;

        let mut requirement = VersionRequirement {
            version: raw.read_u16(0)?,
            file: resolve(strings, raw.read_u32(4)?),
            auxiliaries: Vec::new(),
        };

        let mut aux_offset = offset.saturating_add(vn_aux);
        for _ in 0..vn_cnt.min(MAX_VERSION_RECORDS) {
            let aux = stream.slice(aux_offset, 16)?;
            requirement.auxiliaries.push(VersionRequirementAux {
                hash: aux.read_u32(0)?,
                flags: aux.read_u16(4)?,
                other: aux.read_u16(6)?,
                name: resolve(strings, aux.read_u32(8)?),
            });
            let vna_next = aux.read_u32(12)? as u64;
            if vna_next == 0 {
                break;
            }
            aux_offset = aux_offset.saturating_add(vna_next);
        }

        out.push(requirement);
        if vn_next == 0 {
            break;
        }
        offset = offset.saturating_add(vn_next);
    }
    Ok(())
}

/// Decode the `DT_VERDEF` chain
pub fn parse_version_definitions(
    image: &BinaryImage,
    stream: &ByteStream<'_>,
    strings: Option<&ByteStream<'_>>,
) -> Vec<VersionDefinition> {
    let mut out = Vec::new();
    let Some(addr) = image.dynamic_value(DT_VERDEF) else {
        return out;
    };
    let count = image
        .dynamic_value(DT_VERDEFNUM)
        .unwrap_or(0)
        .min(MAX_VERSION_RECORDS);

    let walk = virtual_address_to_offset(image.segments(), addr)
        .and_then(|offset| walk_definitions(stream, strings, offset, count, &mut out));
    if let Err(e) = walk {
        warn!(error = %e, parsed = out.len(), "Version definitions truncated");
    }
    out
}

fn walk_definitions(
    stream: &ByteStream<'_>,
    strings: Option<&ByteStream<'_>>,
    mut offset: u64,
    count: u64,
    out: &mut Vec<VersionDefinition>,
) -> Result<()> {
    for _ in 0..count {
        let raw = stream.slice(offset, 20)?;
        let vd_cnt = raw.read_u16(6)? as u64;
        let vd_aux = raw.read_u32(12)? as u64;
        let vd_next = raw.read_u32(16)? as u64;

        let mut definition = VersionDefinition {
            version: raw.read_u16(0)?,
            flags: raw.read_u16(2)?,
            index: raw.read_u16(4)?,
            hash: raw.read_u32(8)?,
            names: Vec::new(),
        };

        let mut aux_offset = offset.saturating_add(vd_aux);
        for _ in 0..vd_cnt.min(MAX_VERSION_RECORDS) {
            let aux = stream.slice(aux_offset, 8)?;
            definition.names.push(resolve(strings, aux.read_u32(0)?));
            let vda_next = aux.read_u32(4)? as u64;
            if vda_next == 0 {
                break;
            }
            aux_offset = aux_offset.saturating_add(vda_next);
        }

        out.push(definition);
        if vd_next == 0 {
            break;
        }
        offset = offset.saturating_add(vd_next);
    }
    Ok(())
}

fn resolve(strings: Option<&ByteStream<'_>>, offset: u32) -> String {
    strings
        .and_then(|s| s.read_cstring(offset as u64).ok())
        .unwrap_or_default()
}

/// Name each versioned entry of the version array from the requirement
/// auxiliaries and definitions carrying the same index.
pub fn resolve_version_names(image: &mut BinaryImage) {
    let BinaryImage {
        symbol_versions,
        version_requirements,
        version_definitions,
        ..
    } = image;

    for version in symbol_versions.iter_mut() {
        let VersionKind::Index(index) = version.kind() else {
            continue;
        };
        let required = version_requirements
            .iter()
            .flat_map(|r| r.auxiliaries.iter())
            .find(|aux| aux.other == index)
            .map(|aux| aux.name.clone());
        let defined = || {
            version_definitions
                .iter()
                .find(|d| d.index == index)
                .and_then(|d| d.names.first().cloned())
        };
        version.name = required.or_else(defined).filter(|n| !n.is_empty());
    }
}
