//! ELF header parsing

use crate::formats::elf::layout::ElfLayout;
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use tracing::warn;

/// Cheap check that `data` is plausibly an ELF image.
///
/// Only the identification prefix is inspected; nothing is allocated.
pub fn is_elf(data: &[u8]) -> bool {
    data.len() >= EI_NIDENT && &data[0..4] == ELF_MAGIC
}

/// Parse ELF identification bytes
pub fn parse_ident(stream: &ByteStream<'_>) -> Result<ElfIdent> {
    let ident = stream.read(0, EI_NIDENT as u64)?;

    if &ident[0..4] != ELF_MAGIC {
        return Err(ElfError::FormatMismatch("bad magic number".to_string()));
    }

    let class = ElfClass::from_u8(ident[EI_CLASS])?;
    let data = ElfData::from_u8(ident[EI_DATA])?;

    Ok(ElfIdent {
        class,
        data,
        version: ident[EI_VERSION],
        osabi: ident[EI_OSABI],
        abiversion: ident[EI_ABIVERSION],
    })
}

/// Parse the file header with `L`'s field widths.
///
/// `stream` must already decode with the endianness declared in `ident`.
pub fn parse_header<L: ElfLayout>(stream: &ByteStream<'_>, ident: ElfIdent) -> Result<ElfHeader> {
    let raw = stream.slice(0, L::EHDR_SIZE)?;
    let w = L::WORD;

    let header = ElfHeader {
        ident,
        e_type: raw.read_u16(16)?,
        e_machine: raw.read_u16(18)?,
        e_version: raw.read_u32(20)?,
        e_entry: L::read_word(&raw, 24)?,
        e_phoff: L::read_word(&raw, 24 + w)?,
        e_shoff: L::read_word(&raw, 24 + 2 * w)?,
        e_flags: raw.read_u32(24 + 3 * w)?,
        e_ehsize: raw.read_u16(28 + 3 * w)?,
        e_phentsize: raw.read_u16(30 + 3 * w)?,
        e_phnum: raw.read_u16(32 + 3 * w)?,
        e_shentsize: raw.read_u16(34 + 3 * w)?,
        e_shnum: raw.read_u16(36 + 3 * w)?,
        e_shstrndx: raw.read_u16(38 + 3 * w)?,
    };

    // Entry strides are taken from the class, not from the header, so a
    // mismatch is only worth a warning.
    if header.e_phnum > 0 && header.e_phentsize as u64 != L::PHDR_SIZE {
        warn!(
            expected = L::PHDR_SIZE,
            found = header.e_phentsize,
            "Unexpected e_phentsize"
        );
    }
    if header.e_shnum > 0 && header.e_shentsize as u64 != L::SHDR_SIZE {
        warn!(
            expected = L::SHDR_SIZE,
            found = header.e_shentsize,
            "Unexpected e_shentsize"
        );
    }

    Ok(header)
}
