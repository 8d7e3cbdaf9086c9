//! Synthetic ELF images for integration tests.
//!
//! `ElfBuilder` lays out a small shared object at fixed file offsets, mapped by
//! a single loadable segment at `BASE_VADDR`. Every structure can be toggled or
//! displaced so tests can exercise the fallback paths.

#![allow(dead_code)]

use elfmodel::formats::elf::*;
use std::io::Write;
use tempfile::NamedTempFile;

pub const BASE_VADDR: u64 = 0x40_0000;
pub const IMAGE_SIZE: usize = 0x1000;

pub const PHDR_OFFSET: u64 = 0x40;
pub const DYNAMIC_OFFSET: u64 = 0x100;
pub const DYNSTR_OFFSET: u64 = 0x200;
pub const DYNSYM_OFFSET: u64 = 0x300;
pub const VERSYM_OFFSET: u64 = 0x500;
pub const HASH_OFFSET: u64 = 0x600;
pub const SHSTRTAB_OFFSET: u64 = 0x700;
pub const SHDR_OFFSET: u64 = 0x800;
pub const ALT_DYNSTR_OFFSET: u64 = 0xa00;
pub const VERNEED_OFFSET: u64 = 0xb00;

pub fn vaddr(offset: u64) -> u64 {
    BASE_VADDR + offset
}

/// Write `content` to a fresh temporary file
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file
}

/// Null-separated string blob with a leading empty string
pub struct Strings {
    pub blob: Vec<u8>,
}

impl Strings {
    pub fn new() -> Self {
        Self { blob: vec![0] }
    }

    pub fn add(&mut self, s: &str) -> u32 {
        let offset = self.blob.len() as u32;
        self.blob.extend_from_slice(s.as_bytes());
        self.blob.push(0);
        offset
    }
}

struct Writer {
    data: Vec<u8>,
    class: ElfClass,
    endian: ElfData,
}

impl Writer {
    fn is64(&self) -> bool {
        self.class == ElfClass::Elf64
    }

    fn word_size(&self) -> u64 {
        if self.is64() {
            8
        } else {
            4
        }
    }

    fn bytes(&mut self, offset: u64, bytes: &[u8]) {
        let start = offset as usize;
        if start >= self.data.len() {
            return;
        }
        let end = (start + bytes.len()).min(self.data.len());
        self.data[start..end].copy_from_slice(&bytes[..end - start]);
    }

    fn u8(&mut self, offset: u64, v: u8) {
        self.bytes(offset, &[v]);
    }

    fn u16(&mut self, offset: u64, v: u16) {
        match self.endian {
            ElfData::Little => self.bytes(offset, &v.to_le_bytes()),
            ElfData::Big => self.bytes(offset, &v.to_be_bytes()),
        }
    }

    fn u32(&mut self, offset: u64, v: u32) {
        match self.endian {
            ElfData::Little => self.bytes(offset, &v.to_le_bytes()),
            ElfData::Big => self.bytes(offset, &v.to_be_bytes()),
        }
    }

    fn u64(&mut self, offset: u64, v: u64) {
        match self.endian {
            ElfData::Little => self.bytes(offset, &v.to_le_bytes()),
            ElfData::Big => self.bytes(offset, &v.to_be_bytes()),
        }
    }

    fn word(&mut self, offset: u64, v: u64) {
        if self.is64() {
            self.u64(offset, v);
        } else {
            self.u32(offset, v as u32);
        }
    }
}

/// Builder for a small dynamically linked ELF image
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    pub class: ElfClass,
    pub endian: ElfData,
    /// `(name, st_info)` per dynamic symbol, index 0 first
    pub symbols: Vec<(String, u8)>,
    /// Version array contents; `None` emits no `DT_VERSYM`
    pub versions: Option<Vec<u16>>,
    pub versym_offset: u64,
    /// `(version name, index)` required from `libc.so.6`
    pub needed_versions: Vec<(String, u16)>,
    pub dynamic_segment: bool,
    pub sections: bool,
    /// Point the `.dynstr` section at `ALT_DYNSTR_OFFSET`
    pub dynstr_section_at_alt: bool,
    /// Blob written at `ALT_DYNSTR_OFFSET`
    pub alt_dynstr: Option<Vec<u8>>,
    /// Replaces the `DT_STRTAB` value
    pub strtab_vaddr: Option<u64>,
    /// Entries written after the `DT_NULL` terminator, still inside the segment
    pub trailing_dynamic: Vec<(i64, u64)>,
    /// Replaces the `DT_HASH` chain count
    pub hash_nchain: Option<u32>,
}

impl ElfBuilder {
    pub fn new(class: ElfClass, endian: ElfData) -> Self {
        Self {
            class,
            endian,
            symbols: vec![(String::new(), 0)],
            versions: None,
            versym_offset: VERSYM_OFFSET,
            needed_versions: Vec::new(),
            dynamic_segment: true,
            sections: true,
            dynstr_section_at_alt: false,
            alt_dynstr: None,
            strtab_vaddr: None,
            trailing_dynamic: Vec::new(),
            hash_nchain: None,
        }
    }

    /// Null symbol followed by global functions named `names`
    pub fn with_functions(mut self, names: &[&str]) -> Self {
        self.symbols = std::iter::once((String::new(), 0))
            .chain(names.iter().map(|n| (n.to_string(), (STB_GLOBAL << 4) | STT_FUNC)))
            .collect();
        self
    }

    pub fn with_symbols(mut self, symbols: &[(&str, u8)]) -> Self {
        self.symbols = symbols.iter().map(|(n, i)| (n.to_string(), *i)).collect();
        self
    }

    pub fn with_versions(mut self, versions: &[u16]) -> Self {
        self.versions = Some(versions.to_vec());
        self
    }

    pub fn with_needed_versions(mut self, needed: &[(&str, u16)]) -> Self {
        self.needed_versions = needed.iter().map(|(n, i)| (n.to_string(), *i)).collect();
        self
    }

    pub fn without_dynamic_segment(mut self) -> Self {
        self.dynamic_segment = false;
        self
    }

    pub fn without_sections(mut self) -> Self {
        self.sections = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer {
            data: vec![0u8; IMAGE_SIZE],
            class: self.class,
            endian: self.endian,
        };
        let word = w.word_size();
        let is64 = w.is64();
        let sym_size: u64 = if is64 { 24 } else { 16 };

        // Dynamic strings
        let mut strings = Strings::new();
        let name_offsets: Vec<u32> = self
            .symbols
            .iter()
            .map(|(n, _)| if n.is_empty() { 0 } else { strings.add(n) })
            .collect();
        let needed: Vec<(u32, u16)> = self
            .needed_versions
            .iter()
            .map(|(n, index)| (strings.add(n), *index))
            .collect();
        let library = if needed.is_empty() { 0 } else { strings.add("libc.so.6") };
        w.bytes(DYNSTR_OFFSET, &strings.blob);
        if let Some(alt) = &self.alt_dynstr {
            w.bytes(ALT_DYNSTR_OFFSET, alt);
        }

        // Dynamic symbols
        for (i, ((_, info), name)) in self.symbols.iter().zip(&name_offsets).enumerate() {
            let off = DYNSYM_OFFSET + i as u64 * sym_size;
            let value = 0x1000 * i as u64;
            let size = 0x10 * i as u64;
            let shndx: u16 = if i == 0 { 0 } else { 2 };
            if is64 {
                w.u32(off, *name);
                w.u8(off + 4, *info);
                w.u16(off + 6, shndx);
                w.u64(off + 8, value);
                w.u64(off + 16, size);
            } else {
                w.u32(off, *name);
                w.u32(off + 4, value as u32);
                w.u32(off + 8, size as u32);
                w.u8(off + 12, *info);
                w.u16(off + 14, shndx);
            }
        }

        // DT_HASH header: nbucket, nchain
        w.u32(HASH_OFFSET, 1);
        w.u32(
            HASH_OFFSET + 4,
            self.hash_nchain.unwrap_or(self.symbols.len() as u32),
        );

        if let Some(versions) = &self.versions {
            for (i, v) in versions.iter().enumerate() {
                w.u16(self.versym_offset + 2 * i as u64, *v);
            }
        }

        if !needed.is_empty() {
            w.u16(VERNEED_OFFSET, 1);
            w.u16(VERNEED_OFFSET + 2, needed.len() as u16);
            w.u32(VERNEED_OFFSET + 4, library);
            w.u32(VERNEED_OFFSET + 8, 16);
            for (i, (name, index)) in needed.iter().enumerate() {
                let off = VERNEED_OFFSET + 16 + 16 * i as u64;
                w.u16(off + 6, *index);
                w.u32(off + 8, *name);
                let next = if i + 1 < needed.len() { 16 } else { 0 };
                w.u32(off + 12, next);
            }
        }

        // Dynamic array
        let mut dynamic = vec![
            (DT_HASH, vaddr(HASH_OFFSET)),
            (DT_STRTAB, self.strtab_vaddr.unwrap_or(vaddr(DYNSTR_OFFSET))),
            (DT_SYMTAB, vaddr(DYNSYM_OFFSET)),
            (DT_STRSZ, strings.blob.len() as u64),
            (DT_SYMENT, sym_size),
        ];
        if self.versions.is_some() {
            dynamic.push((DT_VERSYM, vaddr(self.versym_offset)));
        }
        if !needed.is_empty() {
            dynamic.push((DT_VERNEED, vaddr(VERNEED_OFFSET)));
            dynamic.push((DT_VERNEEDNUM, 1));
        }
        dynamic.push((DT_NULL, 0));
        dynamic.extend(self.trailing_dynamic.iter().copied());
        for (i, (tag, val)) in dynamic.iter().enumerate() {
            let off = DYNAMIC_OFFSET + i as u64 * 2 * word;
            w.word(off, *tag as u64);
            w.word(off + word, *val);
        }
        let dynamic_size = dynamic.len() as u64 * 2 * word;

        // Program headers
        let mut phdrs = vec![(PT_LOAD, PF_R | PF_X, 0, BASE_VADDR, IMAGE_SIZE as u64, 0x1000)];
        if self.dynamic_segment {
            phdrs.push((
                PT_DYNAMIC,
                PF_R | PF_W,
                DYNAMIC_OFFSET,
                vaddr(DYNAMIC_OFFSET),
                dynamic_size,
                word,
            ));
        }
        let phentsize: u64 = if is64 { 56 } else { 32 };
        for (i, (p_type, flags, offset, va, size, align)) in phdrs.iter().enumerate() {
            let off = PHDR_OFFSET + i as u64 * phentsize;
            if is64 {
                w.u32(off, *p_type);
                w.u32(off + 4, *flags);
                w.u64(off + 8, *offset);
                w.u64(off + 16, *va);
                w.u64(off + 24, *va);
                w.u64(off + 32, *size);
                w.u64(off + 40, *size);
                w.u64(off + 48, *align);
            } else {
                w.u32(off, *p_type);
                w.u32(off + 4, *offset as u32);
                w.u32(off + 8, *va as u32);
                w.u32(off + 12, *va as u32);
                w.u32(off + 16, *size as u32);
                w.u32(off + 20, *size as u32);
                w.u32(off + 24, *flags);
                w.u32(off + 28, *align as u32);
            }
        }

        // Section headers
        let shentsize: u64 = if is64 { 64 } else { 40 };
        let mut shnum = 0;
        if self.sections {
            let mut names = Strings::new();
            let dynstr_offset = if self.dynstr_section_at_alt {
                ALT_DYNSTR_OFFSET
            } else {
                DYNSTR_OFFSET
            };
            let versym_type = if self.versions.is_some() {
                SHT_GNU_VERSYM
            } else {
                SHT_PROGBITS
            };
            let symbol_count = self.symbols.len() as u64;
            let headers = [
                (names.add(".dynstr"), SHT_STRTAB, dynstr_offset, 0x100, 0, 0, 1, 0),
                (
                    names.add(".dynsym"),
                    SHT_DYNSYM,
                    DYNSYM_OFFSET,
                    symbol_count * sym_size,
                    1,
                    1,
                    word,
                    sym_size,
                ),
                (
                    names.add(".gnu.version"),
                    versym_type,
                    self.versym_offset,
                    symbol_count * 2,
                    2,
                    0,
                    2,
                    2,
                ),
                (
                    names.add(".shstrtab"),
                    SHT_STRTAB,
                    SHSTRTAB_OFFSET,
                    0,
                    0,
                    0,
                    1,
                    0,
                ),
            ];
            w.bytes(SHSTRTAB_OFFSET, &names.blob);

            // Index 0 stays the null section header
            for (i, (name, sh_type, offset, size, link, info, align, entsize)) in
                headers.iter().enumerate()
            {
                let off = SHDR_OFFSET + (i as u64 + 1) * shentsize;
                let size = if *sh_type == SHT_STRTAB && *offset == SHSTRTAB_OFFSET {
                    names.blob.len() as u64
                } else {
                    *size
                };
                w.u32(off, *name);
                w.u32(off + 4, *sh_type);
                w.word(off + 8, SHF_ALLOC);
                w.word(off + 8 + word, vaddr(*offset));
                w.word(off + 8 + 2 * word, *offset);
                w.word(off + 8 + 3 * word, size);
                w.u32(off + 8 + 4 * word, *link);
                w.u32(off + 12 + 4 * word, *info);
                w.word(off + 16 + 4 * word, *align);
                w.word(off + 16 + 5 * word, *entsize);
            }
            shnum = headers.len() as u16 + 1;
        }

        // File header
        w.bytes(0, ELF_MAGIC);
        w.u8(EI_CLASS as u64, self.class as u8);
        w.u8(EI_DATA as u64, if self.endian == ElfData::Little { 1 } else { 2 });
        w.u8(EI_VERSION as u64, 1);
        w.u16(16, 3); // ET_DYN
        w.u16(18, if is64 { 62 } else { 3 });
        w.u32(20, 1);
        w.word(24, BASE_VADDR);
        w.word(24 + word, PHDR_OFFSET);
        w.word(24 + 2 * word, if self.sections { SHDR_OFFSET } else { 0 });
        w.u16(28 + 3 * word, if is64 { 64 } else { 52 });
        w.u16(30 + 3 * word, phentsize as u16);
        w.u16(32 + 3 * word, phdrs.len() as u16);
        w.u16(34 + 3 * word, shentsize as u16);
        w.u16(36 + 3 * word, shnum);
        w.u16(38 + 3 * word, if self.sections { shnum - 1 } else { 0 });

        w.data
    }
}

/// Every class/encoding combination
pub fn all_layouts() -> [(ElfClass, ElfData); 4] {
    [
        (ElfClass::Elf32, ElfData::Little),
        (ElfClass::Elf32, ElfData::Big),
        (ElfClass::Elf64, ElfData::Little),
        (ElfClass::Elf64, ElfData::Big),
    ]
}
