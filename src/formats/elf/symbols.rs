//! Dynamic symbol table parsing

use crate::formats::elf::binary::BinaryImage;
use crate::formats::elf::config::{DynsymCountMethod, ParserConfig};
use crate::formats::elf::layout::ElfLayout;
use crate::formats::elf::sections::find_section_by_type;
use crate::formats::elf::segments::{virtual_address_to_offset, Segment};
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// One entry of the dynamic symbol table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicSymbol {
    /// Resolved name; empty when the dynamic string table is unavailable
    pub name: String,
    pub name_offset: u32,
    pub value: u64,
    pub size: u64,
    pub info: u8,
    pub other: u8,
    pub section_index: u16,
    /// Index into [`BinaryImage::symbol_versions`], set by version linking
    pub(crate) version: Option<usize>,
}

impl DynamicSymbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> u8 {
        self.info >> 4
    }

    pub fn symbol_type(&self) -> u8 {
        self.info & 0xf
    }

    pub fn visibility(&self) -> u8 {
        self.other & 0x3
    }

    pub fn is_undefined(&self) -> bool {
        self.section_index == SHN_UNDEF
    }

    pub fn is_global(&self) -> bool {
        self.binding() == STB_GLOBAL
    }

    pub fn is_weak(&self) -> bool {
        self.binding() == STB_WEAK
    }

    pub fn is_function(&self) -> bool {
        self.symbol_type() == STT_FUNC
    }

    /// Position of the linked version in the image's version table
    pub fn version_index(&self) -> Option<usize> {
        self.version
    }

    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }
}

fn checked(base: u64, delta: u64, stream: &ByteStream<'_>) -> Result<u64> {
    base.checked_add(delta).ok_or(ElfError::OutOfBounds {
        offset: base,
        length: delta,
        size: stream.len() as u64,
    })
}

/// Symbol count from the size of the `SHT_DYNSYM` section
pub fn count_from_section<L: ElfLayout>(image: &BinaryImage) -> Result<u32> {
    let section = find_section_by_type(image.sections(), SHT_DYNSYM)
        .ok_or_else(|| ElfError::ConversionError("no SHT_DYNSYM section".to_string()))?;
    let entry_size = if section.entry_size == 0 {
        L::SYM_SIZE
    } else {
        section.entry_size
    };
    Ok(u32::try_from(section.size / entry_size).unwrap_or(u32::MAX))
}

/// Symbol count from `DT_HASH`, or a chain walk of `DT_GNU_HASH`
pub fn count_from_hash<L: ElfLayout>(image: &BinaryImage, stream: &ByteStream<'_>) -> Result<u32> {
    if let Some(addr) = image.dynamic_value(DT_HASH) {
        let offset = virtual_address_to_offset(image.segments(), addr)?;
        // nbucket, nchain
        return stream.read_u32(checked(offset, 4, stream)?);
    }
    if let Some(addr) = image.dynamic_value(DT_GNU_HASH) {
        return count_from_gnu_hash::<L>(image.segments(), stream, addr);
    }
    Err(ElfError::ConversionError(
        "no DT_HASH or DT_GNU_HASH entry".to_string(),
    ))
}

fn count_from_gnu_hash<L: ElfLayout>(
    segments: &[Segment],
    stream: &ByteStream<'_>,
    addr: u64,
) -> Result<u32> {
    let offset = virtual_address_to_offset(segments, addr)?;
    let nbuckets = stream.read_u32(offset)? as u64;
    let symoffset = stream.read_u32(checked(offset, 4, stream)?)?;
    let bloom_size = stream.read_u32(checked(offset, 8, stream)?)? as u64;

    let buckets = checked(offset, 16 + bloom_size * L::WORD, stream)?;
    let mut max_bucket = 0u32;
    for i in 0..nbuckets {
        max_bucket = max_bucket.max(stream.read_u32(checked(buckets, i * 4, stream)?)?);
    }
    if max_bucket < symoffset {
        return Ok(symoffset);
    }

    // The chain of the highest bucket ends on the last symbol of the table
    let chains = checked(buckets, nbuckets * 4, stream)?;
    let mut index = max_bucket;
    loop {
        let slot = (index - symoffset) as u64;
        let hash = stream.read_u32(checked(chains, slot * 4, stream)?)?;
        index = index.checked_add(1).ok_or_else(|| {
            ElfError::ConversionError("GNU hash chain does not terminate".to_string())
        })?;
        if hash & 1 == 1 {
            return Ok(index);
        }
    }
}

/// Symbol count from the highest symbol index referenced by a relocation
pub fn count_from_relocations(image: &BinaryImage) -> u32 {
    image
        .dynamic_relocations()
        .iter()
        .map(|r| r.symbol_index.saturating_add(1))
        .max()
        .unwrap_or(0)
}

/// Number of dynamic symbols according to `config.dynsym_count`.
///
/// A method that cannot produce a count contributes 0.
pub fn count_dynamic_symbols<L: ElfLayout>(
    image: &BinaryImage,
    stream: &ByteStream<'_>,
    config: &ParserConfig,
) -> u32 {
    let or_zero = |method: &str, count: Result<u32>| {
        count.unwrap_or_else(|e| {
            debug!(method, error = %e, "Symbol count unavailable");
            0
        })
    };

    let count = match config.dynsym_count {
        DynsymCountMethod::Section => or_zero("section", count_from_section::<L>(image)),
        DynsymCountMethod::Hash => or_zero("hash", count_from_hash::<L>(image, stream)),
        DynsymCountMethod::Relocations => count_from_relocations(image),
        DynsymCountMethod::Auto => {
            let mut count = count_from_relocations(image);
            let candidates = [
                or_zero("section", count_from_section::<L>(image)),
                or_zero("hash", count_from_hash::<L>(image, stream)),
            ];
            for candidate in candidates {
                if candidate < config.max_dynamic_symbols
                    && candidate > count
                    && candidate - count < config.symbol_count_delta
                {
                    count = candidate;
                }
            }
            count
        }
    };

    debug!(method = ?config.dynsym_count, count, "Dynamic symbol count");
    count
}

fn symbol_table_offset(image: &BinaryImage) -> Option<u64> {
    if let Some(addr) = image.dynamic_value(DT_SYMTAB) {
        match virtual_address_to_offset(image.segments(), addr) {
            Ok(offset) => return Some(offset),
            Err(e) => debug!(error = %e, "DT_SYMTAB unmapped, trying .dynsym"),
        }
    }
    find_section_by_type(image.sections(), SHT_DYNSYM).map(|s| s.file_offset)
}

/// Read the dynamic symbol table.
///
/// Names resolve against `strings` when the dynamic string table was located.
/// Reading stops at the first entry outside the buffer, keeping the entries
/// already decoded.
pub fn parse_dynamic_symbols<L: ElfLayout>(
    image: &BinaryImage,
    stream: &ByteStream<'_>,
    strings: Option<&ByteStream<'_>>,
    config: &ParserConfig,
) -> Vec<DynamicSymbol> {
    let count = count_dynamic_symbols::<L>(image, stream, config);
    if count == 0 {
        return Vec::new();
    }

    let Some(table) = symbol_table_offset(image) else {
        warn!(count, "Dynamic symbol table not found");
        return Vec::new();
    };
    debug!(offset = table, count, "Parsing dynamic symbols");

    let mut symbols = Vec::new();
    for i in 0..count as u64 {
        let entry = checked(table, i * L::SYM_SIZE, stream).and_then(|off| L::symbol(stream, off));
        let mut symbol = match entry {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!(index = i, error = %e, "Dynamic symbol table truncated");
                break;
            }
        };
        if let Some(strings) = strings {
            match strings.read_cstring(symbol.name_offset as u64) {
                Ok(name) => symbol.name = name,
                Err(_) => trace!(index = i, offset = symbol.name_offset, "Unresolved symbol name"),
            }
        }
        symbols.push(symbol);
    }

    symbols
}
