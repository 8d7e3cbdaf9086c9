//! ELF (Executable and Linkable Format) parser
//!
//! Decodes a raw ELF32 or ELF64 image into an owned [`BinaryImage`]: file
//! header, program headers, section headers, the dynamic array, dynamic
//! relocations, dynamic symbols, and symbol versioning. Every read goes through
//! the bounds-checked [`ByteStream`]; the two classes share one generic
//! extraction routine parameterized by [`layout::ElfLayout`].

pub mod binary;
pub mod config;
pub mod dynamic;
pub mod headers;
pub mod layout;
pub mod parser;
pub mod relocations;
pub mod sections;
pub mod segments;
pub mod stream;
pub mod symbols;
pub mod types;
pub mod versions;

pub use binary::BinaryImage;
pub use config::{DynsymCountMethod, ParserConfig};
pub use dynamic::{locate_dynamic_string_table, locate_string_table, StringTableLocation};
pub use headers::is_elf;
pub use parser::{parse, parse_path, Parser};
pub use relocations::{Relocation, RelocationOrigin};
pub use sections::Section;
pub use segments::{virtual_address_to_offset, Segment};
pub use stream::ByteStream;
pub use symbols::DynamicSymbol;
pub use types::*;
pub use versions::{
    link_versions, read_versions, SymbolVersion, VersionDefinition, VersionKind,
    VersionRequirement, VersionRequirementAux,
};
