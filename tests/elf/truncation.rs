use crate::common::{ElfBuilder, DYNSYM_OFFSET, IMAGE_SIZE, SHDR_OFFSET};
use elfmodel::formats::elf::*;

#[test]
fn short_identification_never_succeeds() {
    let data = ElfBuilder::new(ElfClass::Elf64, ElfData::Little).build();
    for len in 0..EI_NIDENT {
        let result = parse(&data[..len], "short");
        assert!(
            matches!(
                result,
                Err(ElfError::OutOfBounds { .. }) | Err(ElfError::FormatMismatch(_))
            ),
            "length {len}: {result:?}"
        );
    }
}

#[test]
fn truncated_program_headers_abort() {
    for class in [ElfClass::Elf32, ElfClass::Elf64] {
        let data = ElfBuilder::new(class, ElfData::Big).build();
        assert!(
            matches!(parse(&data[..0x60], "phdrs"), Err(ElfError::OutOfBounds { .. })),
            "{class:?}"
        );
    }
}

#[test]
fn truncated_section_table_is_skipped() {
    let data = ElfBuilder::new(ElfClass::Elf64, ElfData::Little)
        .with_functions(&["puts", "free"])
        .build();
    let cut = SHDR_OFFSET as usize + 8;
    let image = parse(&data[..cut], "cut").unwrap();

    assert_eq!(image.original_size(), cut as u64);
    assert_eq!(image.segments().len(), 2);
    assert!(image.sections().is_empty());
    let names: Vec<&str> = image.dynamic_symbols().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["", "puts", "free"]);
}

#[test]
fn over_declared_symbol_count_stops_at_buffer_end() {
    let mut builder = ElfBuilder::new(ElfClass::Elf64, ElfData::Little).with_functions(&["puts"]);
    builder.hash_nchain = Some(1000);
    let data = builder.build();

    let parser = Parser::new(ParserConfig {
        dynsym_count: DynsymCountMethod::Hash,
        ..ParserConfig::default()
    });
    let image = parser.parse(&data, "overcount").unwrap();
    let fitting = (IMAGE_SIZE - DYNSYM_OFFSET as usize) / 24;
    assert_eq!(image.dynamic_symbols().len(), fitting);
    assert_eq!(image.dynamic_symbols()[1].name(), "puts");
}

#[test]
fn arbitrary_garbage_is_rejected() {
    let mut data = vec![0xa5u8; 256];
    assert!(matches!(parse(&data, "noise"), Err(ElfError::FormatMismatch(_))));
    data[..4].copy_from_slice(ELF_MAGIC);
    assert!(matches!(parse(&data, "noise"), Err(ElfError::CorruptedHeader(_))));
}
