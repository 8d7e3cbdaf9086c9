//! Core ELF types and constants

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ELF parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElfError {
    /// Input does not look like an ELF image at all
    #[error("Not an ELF image: {0}")]
    FormatMismatch(String),

    /// Identification fields carry values outside the known set
    #[error("Corrupted header: {0}")]
    CorruptedHeader(String),

    /// A computed range runs past the end of the buffer
    #[error("Read of {length} bytes at {offset:#x} exceeds buffer of {size} bytes")]
    OutOfBounds { offset: u64, length: u64, size: u64 },

    /// No loadable segment covers the virtual address
    #[error("Virtual address {0:#x} is not mapped by any loadable segment")]
    UnmappedAddress(u64),

    /// Every strategy for resolving a table location failed
    #[error("Conversion error: {0}")]
    ConversionError(String),
}

pub type Result<T> = std::result::Result<T, ElfError>;

/// ELF magic number
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Size of `e_ident`
pub const EI_NIDENT: usize = 16;
pub const EI_CLASS: usize = 4;
pub const EI_DATA: usize = 5;
pub const EI_VERSION: usize = 6;
pub const EI_OSABI: usize = 7;
pub const EI_ABIVERSION: usize = 8;

/// ELF class (32-bit or 64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElfClass {
    Elf32 = 1,
    Elf64 = 2,
}

impl ElfClass {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfClass::Elf32),
            2 => Ok(ElfClass::Elf64),
            _ => Err(ElfError::CorruptedHeader(format!(
                "e_ident[EI_CLASS] corrupted: {}",
                val
            ))),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }
}

/// ELF data encoding (endianness)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElfData {
    #[default]
    Little = 1,
    Big = 2,
}

impl ElfData {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfData::Little),
            2 => Ok(ElfData::Big),
            _ => Err(ElfError::CorruptedHeader(format!(
                "e_ident[EI_DATA] corrupted: {}",
                val
            ))),
        }
    }

    pub fn is_little_endian(&self) -> bool {
        matches!(self, ElfData::Little)
    }
}

/// ELF file type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElfType {
    None = 0,
    Relocatable = 1,
    Executable = 2,
    SharedObject = 3,
    Core = 4,
}

impl From<u16> for ElfType {
    fn from(val: u16) -> Self {
        match val {
            1 => ElfType::Relocatable,
            2 => ElfType::Executable,
            3 => ElfType::SharedObject,
            4 => ElfType::Core,
            _ => ElfType::None,
        }
    }
}

/// ELF machine architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElfMachine {
    None,
    Sparc,
    X86,
    Mips,
    PowerPC,
    PowerPC64,
    S390,
    ARM,
    X86_64,
    AArch64,
    RiscV,
    Other(u16),
}

impl From<u16> for ElfMachine {
    fn from(val: u16) -> Self {
        match val {
            0 => ElfMachine::None,
            2 => ElfMachine::Sparc,
            3 => ElfMachine::X86,
            8 => ElfMachine::Mips,
            20 => ElfMachine::PowerPC,
            21 => ElfMachine::PowerPC64,
            22 => ElfMachine::S390,
            40 => ElfMachine::ARM,
            62 => ElfMachine::X86_64,
            183 => ElfMachine::AArch64,
            243 => ElfMachine::RiscV,
            other => ElfMachine::Other(other),
        }
    }
}

/// ELF identification (first 16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElfIdent {
    pub class: ElfClass,
    pub data: ElfData,
    pub version: u8,
    pub osabi: u8,
    pub abiversion: u8,
}

/// ELF file header with class-independent field widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElfHeader {
    pub ident: ElfIdent,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl ElfHeader {
    pub fn file_type(&self) -> ElfType {
        ElfType::from(self.e_type)
    }

    pub fn machine(&self) -> ElfMachine {
        ElfMachine::from(self.e_machine)
    }

    pub fn entry_point(&self) -> u64 {
        self.e_entry
    }

    pub fn is_pie(&self) -> bool {
        self.e_type == 3 // ET_DYN
    }
}

/// Section types
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_GNU_VERSYM: u32 = 0x6fffffff;

/// Section flags
pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;

/// Special section indices
pub const SHN_UNDEF: u16 = 0;

/// Program header types
pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_GNU_STACK: u32 = 0x6474e551;

/// Program header flags
pub const PF_X: u32 = 0x1;
pub const PF_W: u32 = 0x2;
pub const PF_R: u32 = 0x4;

/// Symbol binding
pub const STB_GLOBAL: u8 = 1;
pub const STB_WEAK: u8 = 2;

/// Symbol types
pub const STT_FUNC: u8 = 2;

/// Dynamic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicEntry {
    pub d_tag: i64,
    pub d_val: u64,
}

/// Dynamic tags
pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_PLTRELSZ: i64 = 2;
pub const DT_HASH: i64 = 4;
pub const DT_STRTAB: i64 = 5;
pub const DT_SYMTAB: i64 = 6;
pub const DT_RELA: i64 = 7;
pub const DT_RELASZ: i64 = 8;
pub const DT_STRSZ: i64 = 10;
pub const DT_SYMENT: i64 = 11;
pub const DT_SONAME: i64 = 14;
pub const DT_REL: i64 = 17;
pub const DT_RELSZ: i64 = 18;
pub const DT_PLTREL: i64 = 20;
pub const DT_JMPREL: i64 = 23;
pub const DT_GNU_HASH: i64 = 0x6ffffef5;
pub const DT_VERSYM: i64 = 0x6ffffff0;
pub const DT_VERDEF: i64 = 0x6ffffffc;
pub const DT_VERDEFNUM: i64 = 0x6ffffffd;
pub const DT_VERNEED: i64 = 0x6ffffffe;
pub const DT_VERNEEDNUM: i64 = 0x6fffffff;

/// Symbol version indices
pub const VER_NDX_LOCAL: u16 = 0;
pub const VER_NDX_GLOBAL: u16 = 1;
pub const VERSYM_HIDDEN: u16 = 0x8000;
pub const VERSYM_VERSION: u16 = 0x7fff;
