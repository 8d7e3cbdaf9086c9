//! Structural ELF parsing into an owned, serializable object model.
//!
//! ```no_run
//! let image = elfmodel::parse_path("/bin/ls")?;
//! for symbol in image.dynamic_symbols() {
//!     let version = image.symbol_version(symbol).and_then(|v| v.name.as_deref());
//!     println!("{} {:?}", symbol.name(), version);
//! }
//! # Ok::<(), elfmodel::ElfModelError>(())
//! ```

/// Crate-level error type
pub mod error;
/// Binary format parsers
pub mod formats;
/// Bounded file access
pub mod io;
/// Tracing setup
pub mod logging;

pub use error::{ElfModelError, Result};
pub use formats::elf::{is_elf, parse, parse_path, BinaryImage, ElfError, Parser, ParserConfig};
