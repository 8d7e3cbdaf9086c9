//! Field-width policy for the two ELF classes.
//!
//! The parser is written once, generic over [`ElfLayout`]. Records whose field
//! order is the same in both classes (file header, section header, dynamic
//! entry, relocation) are decoded generically from [`ElfLayout::WORD`]; only the
//! program header and the symbol entry, whose fields are reordered in ELF64,
//! get a class-specific decoder.

use crate::formats::elf::segments::Segment;
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::symbols::DynamicSymbol;
use crate::formats::elf::types::{ElfClass, Result};

pub trait ElfLayout {
    const CLASS: ElfClass;
    /// Width of an address / offset / `Xword` field
    const WORD: u64;

    const EHDR_SIZE: u64 = 40 + 3 * Self::WORD;
    const PHDR_SIZE: u64;
    const SHDR_SIZE: u64 = 16 + 6 * Self::WORD;
    const SYM_SIZE: u64;
    const DYN_SIZE: u64 = 2 * Self::WORD;
    const REL_SIZE: u64 = 2 * Self::WORD;
    const RELA_SIZE: u64 = 3 * Self::WORD;

    /// Read an address-sized unsigned field
    fn read_word(stream: &ByteStream<'_>, offset: u64) -> Result<u64>;

    /// Read an address-sized signed field
    fn read_sword(stream: &ByteStream<'_>, offset: u64) -> Result<i64>;

    /// Decode one program header entry
    fn program_header(stream: &ByteStream<'_>, offset: u64) -> Result<Segment>;

    /// Decode one symbol entry; the name is left unresolved
    fn symbol(stream: &ByteStream<'_>, offset: u64) -> Result<DynamicSymbol>;

    /// Symbol index of a relocation `r_info`
    fn r_sym(info: u64) -> u32;

    /// Relocation type of a relocation `r_info`
    fn r_type(info: u64) -> u32;
}

/// ELFCLASS32 policy
#[derive(Debug, Clone, Copy)]
pub struct Elf32;

/// ELFCLASS64 policy
#[derive(Debug, Clone, Copy)]
pub struct Elf64;

impl ElfLayout for Elf32 {
    const CLASS: ElfClass = ElfClass::Elf32;
    const WORD: u64 = 4;
    const PHDR_SIZE: u64 = 32;
    const SYM_SIZE: u64 = 16;

    fn read_word(stream: &ByteStream<'_>, offset: u64) -> Result<u64> {
        stream.read_u32(offset).map(u64::from)
    }

    fn read_sword(stream: &ByteStream<'_>, offset: u64) -> Result<i64> {
        stream.read_i32(offset).map(i64::from)
    }

    fn program_header(stream: &ByteStream<'_>, offset: u64) -> Result<Segment> {
        let raw = stream.slice(offset, Self::PHDR_SIZE)?;
        Ok(Segment {
            segment_type: raw.read_u32(0)?,
            file_offset: raw.read_u32(4)? as u64,
            virtual_address: raw.read_u32(8)? as u64,
            physical_address: raw.read_u32(12)? as u64,
            physical_size: raw.read_u32(16)? as u64,
            memory_size: raw.read_u32(20)? as u64,
            flags: raw.read_u32(24)?,
            alignment: raw.read_u32(28)? as u64,
        })
    }

    fn symbol(stream: &ByteStream<'_>, offset: u64) -> Result<DynamicSymbol> {
        let raw = stream.slice(offset, Self::SYM_SIZE)?;
        Ok(DynamicSymbol {
            name: String::new(),
            name_offset: raw.read_u32(0)?,
            value: raw.read_u32(4)? as u64,
            size: raw.read_u32(8)? as u64,
            info: raw.read_u8(12)?,
            other: raw.read_u8(13)?,
            section_index: raw.read_u16(14)?,
            version: None,
        })
    }

    fn r_sym(info: u64) -> u32 {
        (info >> 8) as u32
    }

    fn r_type(info: u64) -> u32 {
        (info & 0xff) as u32
    }
}

impl ElfLayout for Elf64 {
    const CLASS: ElfClass = ElfClass::Elf64;
    const WORD: u64 = 8;
    const PHDR_SIZE: u64 = 56;
    const SYM_SIZE: u64 = 24;

    fn read_word(stream: &ByteStream<'_>, offset: u64) -> Result<u64> {
        stream.read_u64(offset)
    }

    fn read_sword(stream: &ByteStream<'_>, offset: u64) -> Result<i64> {
        stream.read_i64(offset)
    }

    fn program_header(stream: &ByteStream<'_>, offset: u64) -> Result<Segment> {
        let raw = stream.slice(offset, Self::PHDR_SIZE)?;
        Ok(Segment {
            segment_type: raw.read_u32(0)?,
            flags: raw.read_u32(4)?,
            file_offset: raw.read_u64(8)?,
            virtual_address: raw.read_u64(16)?,
            physical_address: raw.read_u64(24)?,
            physical_size: raw.read_u64(32)?,
            memory_size: raw.read_u64(40)?,
            alignment: raw.read_u64(48)?,
        })
    }

    fn symbol(stream: &ByteStream<'_>, offset: u64) -> Result<DynamicSymbol> {
        let raw = stream.slice(offset, Self::SYM_SIZE)?;
        Ok(DynamicSymbol {
            name: String::new(),
            name_offset: raw.read_u32(0)?,
            info: raw.read_u8(4)?,
            other: raw.read_u8(5)?,
            section_index: raw.read_u16(6)?,
            value: raw.read_u64(8)?,
            size: raw.read_u64(16)?,
            version: None,
        })
    }

    fn r_sym(info: u64) -> u32 {
        (info >> 32) as u32
    }

    fn r_type(info: u64) -> u32 {
        info as u32
    }
}
