//! Dynamic array parsing and dynamic string table resolution

use crate::formats::elf::binary::BinaryImage;
use crate::formats::elf::layout::{Elf32, Elf64, ElfLayout};
use crate::formats::elf::sections::{find_section, find_section_by_type, Section};
use crate::formats::elf::segments::{virtual_address_to_offset, Segment};
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::types::*;
use tracing::{debug, trace, warn};

/// Decode the dynamic array up to its `DT_NULL` terminator.
///
/// The array comes from the `PT_DYNAMIC` segment. A `SHT_DYNAMIC` section is
/// used when the image has no such segment or the segment lies outside the
/// buffer. An array that cannot be read from either yields no entries.
pub fn parse_dynamic_entries<L: ElfLayout>(
    stream: &ByteStream<'_>,
    segments: &[Segment],
    sections: &[Section],
) -> Vec<DynamicEntry> {
    let from_segment = segments
        .iter()
        .find(|s| s.is_dynamic())
        .map(|s| (s.file_offset, s.physical_size));
    let from_section =
        find_section_by_type(sections, SHT_DYNAMIC).map(|s| (s.file_offset, s.size));

    if from_segment.is_none() && from_section.is_none() {
        debug!("No dynamic array");
        return Vec::new();
    }

    let array = from_segment
        .into_iter()
        .chain(from_section)
        .find_map(|(offset, size)| match stream.slice(offset, size) {
            Ok(array) => Some(array),
            Err(e) => {
                warn!(offset, error = %e, "Dynamic array is out of bounds");
                None
            }
        });
    let Some(array) = array else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for i in 0..array.len() as u64 / L::DYN_SIZE {
        let Ok(entry) = read_entry::<L>(&array, i) else {
            break;
        };
        if entry.d_tag == DT_NULL {
            break;
        }
        trace!(tag = entry.d_tag, value = entry.d_val, "Dynamic entry");
        entries.push(entry);
    }

    debug!(count = entries.len(), "Parsed dynamic entries");
    entries
}

fn read_entry<L: ElfLayout>(array: &ByteStream<'_>, index: u64) -> Result<DynamicEntry> {
    let offset = index * L::DYN_SIZE;
    Ok(DynamicEntry {
        d_tag: L::read_sword(array, offset)?,
        d_val: L::read_word(array, offset + L::WORD)?,
    })
}

/// Where the dynamic string table was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTableLocation {
    pub offset: u64,
    /// Size of the `.dynstr` section when the section strategy supplied the
    /// offset
    pub section_size: Option<u64>,
}

/// Locate the file offset of the dynamic string table.
///
/// The `DT_STRTAB` entry of the dynamic segment is tried first, then a
/// `.dynstr` string-table section. Fails with [`ElfError::ConversionError`]
/// when neither yields a non-null offset.
pub fn locate_dynamic_string_table(image: &BinaryImage, stream: &ByteStream<'_>) -> Result<u64> {
    locate_string_table(image, stream).map(|location| location.offset)
}

/// [`locate_dynamic_string_table`], also reporting which strategy succeeded
pub fn locate_string_table(
    image: &BinaryImage,
    stream: &ByteStream<'_>,
) -> Result<StringTableLocation> {
    match dynamic_string_table_from_segments(image, stream) {
        Ok(offset) => Ok(StringTableLocation { offset, section_size: None }),
        Err(e) => {
            debug!(error = %e, "Falling back to .dynstr section");
            let section = dynstr_section(image)?;
            Ok(StringTableLocation {
                offset: section.file_offset,
                section_size: Some(section.size),
            })
        }
    }
}

/// Segment strategy of [`locate_dynamic_string_table`].
///
/// The whole file-resident array is scanned and the last `DT_STRTAB` entry
/// wins. Entry width follows the image class.
pub fn dynamic_string_table_from_segments(
    image: &BinaryImage,
    stream: &ByteStream<'_>,
) -> Result<u64> {
    match image.class() {
        ElfClass::Elf32 => strtab_from_segments::<Elf32>(image.segments(), stream),
        ElfClass::Elf64 => strtab_from_segments::<Elf64>(image.segments(), stream),
    }
}

fn strtab_from_segments<L: ElfLayout>(segments: &[Segment], stream: &ByteStream<'_>) -> Result<u64> {
    let conversion = |e: ElfError| ElfError::ConversionError(format!("{} (from segments)", e));

    let dynamic = segments
        .iter()
        .find(|s| s.is_dynamic())
        .ok_or_else(|| ElfError::ConversionError("no PT_DYNAMIC segment".to_string()))?;

    let array = stream
        .slice(dynamic.file_offset, dynamic.physical_size)
        .map_err(conversion)?;

    let mut va_offset = 0;
    for i in 0..dynamic.physical_size / L::DYN_SIZE {
        let entry = read_entry::<L>(&array, i).map_err(conversion)?;
        if entry.d_tag == DT_STRTAB {
            va_offset = virtual_address_to_offset(segments, entry.d_val).map_err(conversion)?;
        }
    }

    if va_offset > 0 {
        Ok(va_offset)
    } else {
        Err(ElfError::ConversionError(
            "unable to convert VA to offset from segments".to_string(),
        ))
    }
}

/// Section strategy of [`locate_dynamic_string_table`]
pub fn dynamic_string_table_from_sections(image: &BinaryImage) -> Result<u64> {
    dynstr_section(image).map(|section| section.file_offset)
}

fn dynstr_section(image: &BinaryImage) -> Result<&Section> {
    match find_section(image.sections(), ".dynstr", SHT_STRTAB) {
        Some(section) if section.file_offset > 0 => Ok(section),
        _ => Err(ElfError::ConversionError(
            "unable to convert VA to offset from sections".to_string(),
        )),
    }
}
