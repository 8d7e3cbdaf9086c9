//! Crate-level error type.
//!
//! Parsing from bytes only ever fails with [`ElfError`]; parsing from a path
//! can additionally fail while opening or reading the file.

use crate::formats::elf::ElfError;
use crate::io::error::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElfModelError {
    /// Malformed or unsupported ELF input
    #[error(transparent)]
    Elf(#[from] ElfError),

    /// File could not be opened or read within the configured limits
    #[error(transparent)]
    Io(#[from] IoError),
}

impl From<std::io::Error> for ElfModelError {
    fn from(err: std::io::Error) -> Self {
        ElfModelError::Io(IoError::StdIo(err))
    }
}

pub type Result<T> = std::result::Result<T, ElfModelError>;
