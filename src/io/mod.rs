//! Bounded file access for the path-based parse entry point.
//!
//! `SafeReader` memory-maps the file and enforces `IOLimits`, so a hostile or
//! oversized input is rejected before the parser ever sees it.

pub mod error;

use crate::io::error::{IoError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Resource limits for file access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IOLimits {
    /// Largest file that may be opened.
    pub max_file_size: u64,
    /// Total bytes that may be read across all reads of one file.
    pub max_read_bytes: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024 * 1024,  // 256MB
            max_read_bytes: 512 * 1024 * 1024, // 512MB
        }
    }
}

/// Memory-mapped reader with a file size cap and a read budget.
pub struct SafeReader {
    path: PathBuf,
    // None for empty files; they cannot be mapped.
    mmap: Option<Mmap>,
    limits: IOLimits,
    bytes_read: u64,
    file_size: u64,
}

impl SafeReader {
    /// Open and map `path`.
    ///
    /// Fails with `FileTooLarge` when the file exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limit = limits.max_file_size,
            "Opening file"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "File is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let mmap = if file_size == 0 {
            None
        } else {
            // Safety: read-only mapping of a regular file.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            limits,
            bytes_read: 0,
            file_size,
        })
    }

    pub fn size(&self) -> u64 {
        self.file_size
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn limits(&self) -> &IOLimits {
        &self.limits
    }

    /// Copy up to `len` bytes starting at `offset`.
    ///
    /// Reads past the end of the file are clipped; a read starting at or past
    /// the end yields an empty buffer. Only bytes actually returned count
    /// against the budget, but the full requested length must fit in it.
    pub fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        if self.bytes_read.saturating_add(len) > self.limits.max_read_bytes {
            warn!(
                path = %self.path.display(),
                current = self.bytes_read,
                requested = len,
                limit = self.limits.max_read_bytes,
                "Read limit exceeded"
            );
            return Err(IoError::ReadLimitExceeded {
                limit: self.limits.max_read_bytes,
                current: self.bytes_read,
            });
        }

        let Some(map) = &self.mmap else {
            return Ok(Bytes::new());
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start >= map.len() {
            return Ok(Bytes::new());
        }
        let end = start
            .saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
            .min(map.len());

        let out = Bytes::copy_from_slice(&map[start..end]);
        self.bytes_read += out.len() as u64;

        trace!(
            path = %self.path.display(),
            offset,
            len = out.len(),
            total = self.bytes_read,
            "Read"
        );
        Ok(out)
    }

    /// `read_at(0, len)`
    pub fn read_prefix(&mut self, len: u64) -> Result<Bytes> {
        self.read_at(0, len)
    }

    /// The whole file
    pub fn read_all(&mut self) -> Result<Bytes> {
        self.read_at(0, self.file_size)
    }
}
