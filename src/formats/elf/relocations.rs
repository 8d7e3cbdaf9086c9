//! Dynamic relocation records

use crate::formats::elf::layout::ElfLayout;
use crate::formats::elf::segments::{virtual_address_to_offset, Segment};
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which dynamic table a relocation was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelocationOrigin {
    /// `DT_RELA` / `DT_REL`
    Dynamic,
    /// `DT_JMPREL`
    PltGot,
}

/// Raw relocation record; the type is not interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub offset: u64,
    pub info: u64,
    /// Present for `RELA` records only
    pub addend: Option<i64>,
    pub symbol_index: u32,
    pub relocation_type: u32,
    pub origin: RelocationOrigin,
}

fn dynamic_value(entries: &[DynamicEntry], tag: i64) -> Option<u64> {
    entries.iter().find(|e| e.d_tag == tag).map(|e| e.d_val)
}

/// Decode the relocation tables referenced by the dynamic array.
///
/// A table that cannot be mapped or read is skipped with a warning.
pub fn parse_dynamic_relocations<L: ElfLayout>(
    stream: &ByteStream<'_>,
    segments: &[Segment],
    entries: &[DynamicEntry],
) -> Vec<Relocation> {
    let mut relocations = Vec::new();

    let tables = [
        (DT_RELA, DT_RELASZ, true, RelocationOrigin::Dynamic),
        (DT_REL, DT_RELSZ, false, RelocationOrigin::Dynamic),
    ];
    for (addr_tag, size_tag, is_rela, origin) in tables {
        if let (Some(addr), Some(size)) = (
            dynamic_value(entries, addr_tag),
            dynamic_value(entries, size_tag),
        ) {
            read_table::<L>(stream, segments, addr, size, is_rela, origin, &mut relocations);
        }
    }

    if let (Some(addr), Some(size)) = (
        dynamic_value(entries, DT_JMPREL),
        dynamic_value(entries, DT_PLTRELSZ),
    ) {
        let is_rela = dynamic_value(entries, DT_PLTREL) == Some(DT_RELA as u64);
        read_table::<L>(
            stream,
            segments,
            addr,
            size,
            is_rela,
            RelocationOrigin::PltGot,
            &mut relocations,
        );
    }

    debug!(count = relocations.len(), "Parsed dynamic relocations");
    relocations
}

fn read_table<L: ElfLayout>(
    stream: &ByteStream<'_>,
    segments: &[Segment],
    addr: u64,
    size: u64,
    is_rela: bool,
    origin: RelocationOrigin,
    out: &mut Vec<Relocation>,
) {
    let table = virtual_address_to_offset(segments, addr)
        .and_then(|offset| stream.slice(offset, size));
    let table = match table {
        Ok(table) => table,
        Err(e) => {
            warn!(?origin, error = %e, "Relocation table unavailable");
            return;
        }
    };

    let entry_size = if is_rela { L::RELA_SIZE } else { L::REL_SIZE };
    for i in 0..size / entry_size {
        match read_relocation::<L>(&table, i * entry_size, is_rela, origin) {
            Ok(relocation) => out.push(relocation),
            Err(_) => break,
        }
    }
}

fn read_relocation<L: ElfLayout>(
    table: &ByteStream<'_>,
    offset: u64,
    is_rela: bool,
    origin: RelocationOrigin,
) -> Result<Relocation> {
    let info = L::read_word(table, offset + L::WORD)?;
    let addend = if is_rela {
        Some(L::read_sword(table, offset + 2 * L::WORD)?)
    } else {
        None
    };
    Ok(Relocation {
        offset: L::read_word(table, offset)?,
        info,
        addend,
        symbol_index: L::r_sym(info),
        relocation_type: L::r_type(info),
        origin,
    })
}
