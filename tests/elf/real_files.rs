//! The running test binary as a real-world image.

use elfmodel::formats::elf::*;
use elfmodel::io::{IOLimits, SafeReader};
use elfmodel::logging::init_tracing;
use std::path::PathBuf;

fn current_elf() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let mut reader = SafeReader::open(&exe, IOLimits::default()).ok()?;
    let prefix = reader.read_prefix(EI_NIDENT as u64).ok()?;
    if is_elf(&prefix) {
        Some(exe)
    } else {
        eprintln!("Skipping real-file test; {} is not ELF", exe.display());
        None
    }
}

#[test]
fn parses_test_executable() {
    init_tracing();
    let Some(exe) = current_elf() else { return };
    let image = parse_path(&exe).unwrap();

    let expected = if cfg!(target_pointer_width = "64") {
        ElfClass::Elf64
    } else {
        ElfClass::Elf32
    };
    assert_eq!(image.class(), expected);
    assert!(image.segments().iter().any(|s| s.is_load()));
    assert!(!image.sections().is_empty());
    assert!(image.section(".text", SHT_PROGBITS).is_some());

    let entry = image.header().unwrap().entry_point();
    if entry != 0 {
        assert!(image.virtual_address_to_offset(entry).is_ok());
    }

    // Versions are either fully linked or not at all
    let versions = image.symbol_versions().len();
    let linked = image.dynamic_symbols().iter().filter(|s| s.has_version()).count();
    if versions == image.dynamic_symbols().len() {
        assert_eq!(linked, versions);
    } else {
        assert_eq!(linked, 0);
    }
}

#[test]
fn section_count_matches_dynsym_section() {
    let Some(exe) = current_elf() else { return };
    let parser = Parser::new(ParserConfig {
        dynsym_count: DynsymCountMethod::Section,
        ..ParserConfig::default()
    });
    let image = parser.parse_path(&exe).unwrap();

    let Some(dynsym) = image.sections().iter().find(|s| s.section_type == SHT_DYNSYM) else {
        return;
    };
    let entry_size = if dynsym.entry_size == 0 {
        if image.class() == ElfClass::Elf64 { 24 } else { 16 }
    } else {
        dynsym.entry_size
    };
    assert_eq!(image.dynamic_symbols().len() as u64, dynsym.size / entry_size);
}
