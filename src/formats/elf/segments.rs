//! Program header table management

use crate::formats::elf::layout::ElfLayout;
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One program header entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_type: u32,
    pub flags: u32,
    pub file_offset: u64,
    pub virtual_address: u64,
    pub physical_address: u64,
    /// Bytes present in the file (`p_filesz`)
    pub physical_size: u64,
    /// Bytes occupied in memory (`p_memsz`)
    pub memory_size: u64,
    pub alignment: u64,
}

impl Segment {
    pub fn is_load(&self) -> bool {
        self.segment_type == PT_LOAD
    }

    pub fn is_dynamic(&self) -> bool {
        self.segment_type == PT_DYNAMIC
    }

    pub fn is_executable(&self) -> bool {
        (self.flags & PF_X) != 0
    }

    pub fn is_writable(&self) -> bool {
        (self.flags & PF_W) != 0
    }

    pub fn is_readable(&self) -> bool {
        (self.flags & PF_R) != 0
    }

    /// `[virtual_address, virtual_address + memory_size)` contains `addr`
    pub fn contains_vaddr(&self, addr: u64) -> bool {
        addr >= self.virtual_address
            && addr < self.virtual_address.saturating_add(self.memory_size)
    }
}

/// Parse the program header table.
///
/// The table is declared by the file header, so a table running past the end
/// of the image fails the whole parse.
pub fn parse_segments<L: ElfLayout>(
    stream: &ByteStream<'_>,
    header: &ElfHeader,
) -> Result<Vec<Segment>> {
    let count = header.e_phnum as u64;
    if count == 0 || header.e_phoff == 0 {
        debug!("No program headers");
        return Ok(Vec::new());
    }

    // Validate the whole table up front
    stream.read(header.e_phoff, count * L::PHDR_SIZE)?;

    let mut segments = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = header.e_phoff + i * L::PHDR_SIZE;
        let segment = L::program_header(stream, offset)?;
        trace!(
            index = i,
            p_type = segment.segment_type,
            vaddr = segment.virtual_address,
            "Program header"
        );
        segments.push(segment);
    }

    debug!(count = segments.len(), "Parsed program headers");
    Ok(segments)
}

/// Convert a virtual address to a file offset.
///
/// The first loadable segment whose memory range contains `va` is used; the
/// range end is exclusive.
pub fn virtual_address_to_offset(segments: &[Segment], va: u64) -> Result<u64> {
    segments
        .iter()
        .find(|segment| segment.is_load() && segment.contains_vaddr(va))
        .map(|segment| segment.file_offset.wrapping_add(va - segment.virtual_address))
        .ok_or(ElfError::UnmappedAddress(va))
}
