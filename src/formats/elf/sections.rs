//! Section table management

use crate::formats::elf::layout::ElfLayout;
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// One section header entry with its resolved name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub name_offset: u32,
    pub section_type: u32,
    pub flags: u64,
    pub virtual_address: u64,
    pub file_offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub alignment: u64,
    pub entry_size: u64,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_executable(&self) -> bool {
        (self.flags & SHF_EXECINSTR) != 0
    }

    pub fn is_writable(&self) -> bool {
        (self.flags & SHF_WRITE) != 0
    }

    pub fn is_allocated(&self) -> bool {
        (self.flags & SHF_ALLOC) != 0
    }
}

/// Find a section by name and type
pub fn find_section<'a>(sections: &'a [Section], name: &str, section_type: u32) -> Option<&'a Section> {
    sections
        .iter()
        .find(|s| s.section_type == section_type && s.name == name)
}

/// Find the first section of a given type
pub fn find_section_by_type(sections: &[Section], section_type: u32) -> Option<&Section> {
    sections.iter().find(|s| s.section_type == section_type)
}

/// Parse the section header table and resolve names.
///
/// Section headers are not needed to load an image and stripped or crafted
/// binaries often carry a bogus table, so a table outside the buffer yields
/// no sections instead of an error.
pub fn parse_sections<L: ElfLayout>(stream: &ByteStream<'_>, header: &ElfHeader) -> Vec<Section> {
    let count = header.e_shnum as u64;
    if count == 0 || header.e_shoff == 0 {
        debug!("No section headers");
        return Vec::new();
    }

    let table = match stream.slice(header.e_shoff, count * L::SHDR_SIZE) {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, "Section header table is out of bounds, skipping sections");
            return Vec::new();
        }
    };

    let mut sections = Vec::with_capacity(count as usize);
    for i in 0..count {
        match parse_section_header::<L>(&table, i * L::SHDR_SIZE) {
            Ok(section) => sections.push(section),
            Err(e) => {
                warn!(index = i, error = %e, "Unreadable section header");
                break;
            }
        }
    }

    resolve_names(stream, header, &mut sections);
    debug!(count = sections.len(), "Parsed section headers");
    sections
}

fn resolve_names(stream: &ByteStream<'_>, header: &ElfHeader, sections: &mut [Section]) {
    let shstrndx = header.e_shstrndx as usize;
    let strings = match sections.get(shstrndx) {
        Some(strtab) => match stream.slice(strtab.file_offset, strtab.size) {
            Ok(strings) => strings,
            Err(e) => {
                warn!(error = %e, "Section name table is out of bounds");
                return;
            }
        },
        None => {
            debug!(shstrndx, "No section name table");
            return;
        }
    };

    for section in sections.iter_mut() {
        match strings.read_cstring(section.name_offset as u64) {
            Ok(name) => section.name = name,
            Err(_) => trace!(offset = section.name_offset, "Unresolved section name"),
        }
    }
}

/// Decode one section header; same field order for both classes
fn parse_section_header<L: ElfLayout>(stream: &ByteStream<'_>, offset: u64) -> Result<Section> {
    let raw = stream.slice(offset, L::SHDR_SIZE)?;
    let w = L::WORD;
    Ok(Section {
        name: String::new(),
        name_offset: raw.read_u32(0)?,
        section_type: raw.read_u32(4)?,
        flags: L::read_word(&raw, 8)?,
        virtual_address: L::read_word(&raw, 8 + w)?,
        file_offset: L::read_word(&raw, 8 + 2 * w)?,
        size: L::read_word(&raw, 8 + 3 * w)?,
        link: raw.read_u32(8 + 4 * w)?,
        info: raw.read_u32(12 + 4 * w)?,
        alignment: L::read_word(&raw, 16 + 4 * w)?,
        entry_size: L::read_word(&raw, 16 + 5 * w)?,
    })
}
