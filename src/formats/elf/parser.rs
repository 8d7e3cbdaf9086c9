//! Parse orchestration: class detection, class dispatch and assembly of the
//! [`BinaryImage`].

use crate::error::ElfModelError;
use crate::formats::elf::binary::BinaryImage;
use crate::formats::elf::config::ParserConfig;
use crate::formats::elf::dynamic::{locate_string_table, parse_dynamic_entries, StringTableLocation};
use crate::formats::elf::headers::{is_elf, parse_header, parse_ident};
use crate::formats::elf::layout::{Elf32, Elf64, ElfLayout};
use crate::formats::elf::relocations::parse_dynamic_relocations;
use crate::formats::elf::sections::parse_sections;
use crate::formats::elf::segments::parse_segments;
use crate::formats::elf::stream::ByteStream;
use crate::formats::elf::symbols::parse_dynamic_symbols;
use crate::formats::elf::types::*;
use crate::formats::elf::versions::{
    link_versions, parse_version_definitions, parse_version_requirements, read_versions,
    resolve_version_names, version_table_offset,
};
use crate::io::SafeReader;
use std::path::Path;
use tracing::{debug, debug_span, warn};

/// ELF parser.
///
/// Holds only configuration; every call to [`Parser::parse`] builds a fresh
/// image, so one parser can serve any number of inputs.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse an in-memory image.
    ///
    /// Fails on input without the ELF magic, on an unknown class or data
    /// encoding, and when the file header or program header table do not fit
    /// in `data`. Everything past that is best effort: a table that cannot be
    /// read is left empty and logged.
    pub fn parse(&self, data: &[u8], name: &str) -> Result<BinaryImage> {
        let span = debug_span!("parse_elf", name, size = data.len());
        let _enter = span.enter();

        let stream = ByteStream::new(data);
        let ident = parse_ident(&stream).map_err(|e| crate::log_error!(e))?;
        debug!(class = ?ident.class, data = ?ident.data, "Identified ELF image");

        let stream = stream.with_endian(ident.data);
        let image = match ident.class {
            ElfClass::Elf32 => parse_binary::<Elf32>(&stream, ident, name, &self.config),
            ElfClass::Elf64 => parse_binary::<Elf64>(&stream, ident, name, &self.config),
        };
        image.map_err(|e| crate::log_error!(e, "ELF parse aborted"))
    }

    /// Parse a file through a size-limited memory map.
    ///
    /// The identification prefix is checked before the rest of the file is
    /// read. The image is named after the file's base name.
    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<BinaryImage> {
        let path = path.as_ref();
        let mut reader = SafeReader::open(path, self.config.io.clone())?;

        let prefix = reader.read_prefix(EI_NIDENT as u64)?;
        if !is_elf(&prefix) {
            let err = ElfError::FormatMismatch(format!("{} is not an ELF image", path.display()));
            return Err(ElfModelError::from(crate::log_error!(err)));
        }

        let data = reader.read_all()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.parse(&data, &name)?)
    }
}

/// One extraction routine for both classes; `L` supplies the field widths.
fn parse_binary<L: ElfLayout>(
    stream: &ByteStream<'_>,
    ident: ElfIdent,
    name: &str,
    config: &ParserConfig,
) -> Result<BinaryImage> {
    let mut image = BinaryImage::new(name, L::CLASS, ident.data, stream.len() as u64);

    let header = parse_header::<L>(stream, ident)?;
    image.header = Some(header);
    image.segments = parse_segments::<L>(stream, &header)?;
    image.sections = parse_sections::<L>(stream, &header);
    image.dynamic_entries = parse_dynamic_entries::<L>(stream, &image.segments, &image.sections);
    image.dynamic_relocations =
        parse_dynamic_relocations::<L>(stream, &image.segments, &image.dynamic_entries);

    let strings = match locate_string_table(&image, stream) {
        Ok(location) => {
            debug!(offset = location.offset, "Dynamic string table located");
            image.dynamic_string_table = Some(location.offset);
            string_table(stream, &image, location)
        }
        Err(e) => {
            warn!(error = %e, "Dynamic strings unresolved");
            None
        }
    };

    image.dynamic_symbols = parse_dynamic_symbols::<L>(&image, stream, strings.as_ref(), config);
    image.version_requirements = parse_version_requirements(&image, stream, strings.as_ref());
    image.version_definitions = parse_version_definitions(&image, stream, strings.as_ref());

    match version_table_offset(&image) {
        Some(offset) => {
            if let Err(e) = read_versions(&mut image, stream, offset) {
                warn!(offset, error = %e, "Symbol version table unavailable");
            }
        }
        None => debug!("No symbol version table"),
    }
    link_versions(&mut image);
    resolve_version_names(&mut image);

    debug!(
        segments = image.segments.len(),
        sections = image.sections.len(),
        symbols = image.dynamic_symbols.len(),
        versions = image.symbol_versions.len(),
        "Parsed ELF image"
    );
    Ok(image)
}

/// View of the dynamic string table.
///
/// Bounded by the `.dynstr` section size when the section supplied the
/// offset, otherwise by `DT_STRSZ` when present.
fn string_table<'data>(
    stream: &ByteStream<'data>,
    image: &BinaryImage,
    location: StringTableLocation,
) -> Option<ByteStream<'data>> {
    let offset = location.offset;
    let remaining = (stream.len() as u64).checked_sub(offset)?;
    let size = location
        .section_size
        .or_else(|| image.dynamic_value(DT_STRSZ))
        .map_or(remaining, |size| size.min(remaining));
    stream.slice(offset, size).ok()
}

/// Parse an in-memory image with the default configuration
pub fn parse(data: &[u8], name: &str) -> Result<BinaryImage> {
    Parser::default().parse(data, name)
}

/// Parse a file with the default configuration
pub fn parse_path<P: AsRef<Path>>(path: P) -> crate::error::Result<BinaryImage> {
    Parser::default().parse_path(path)
}
