//! Bounds-checked byte view over an ELF image

use crate::formats::elf::types::{ElfData, ElfError, Result};

/// Read-only view over the raw image.
///
/// Every read is checked against the buffer length before any byte is touched;
/// offsets and lengths come from untrusted header fields, so overflow in the
/// range computation is reported as [`ElfError::OutOfBounds`] as well.
#[derive(Debug, Clone, Copy)]
pub struct ByteStream<'data> {
    data: &'data [u8],
    endian: ElfData,
}

impl<'data> ByteStream<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self {
            data,
            endian: ElfData::Little,
        }
    }

    /// Same view, decoding multi-byte fields with `endian`
    pub fn with_endian(self, endian: ElfData) -> Self {
        Self { endian, ..self }
    }

    pub fn endian(&self) -> ElfData {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole underlying buffer
    pub fn content(&self) -> &'data [u8] {
        self.data
    }

    /// Borrow `[offset, offset + length)` from the buffer
    pub fn read(&self, offset: u64, length: u64) -> Result<&'data [u8]> {
        let oob = || ElfError::OutOfBounds {
            offset,
            length,
            size: self.data.len() as u64,
        };
        let end = offset.checked_add(length).ok_or_else(oob)?;
        if end > self.data.len() as u64 {
            return Err(oob());
        }
        // end fits in usize since it is bounded by the slice length
        Ok(&self.data[offset as usize..end as usize])
    }

    /// Owned copy of `[offset, offset + length)`
    pub fn read_owned(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.read(offset, length).map(<[u8]>::to_vec)
    }

    fn read_array<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(offset, N as u64)?);
        Ok(out)
    }

    pub fn read_u8(&self, offset: u64) -> Result<u8> {
        Ok(self.read_array::<1>(offset)?[0])
    }

    pub fn read_u16(&self, offset: u64) -> Result<u16> {
        let bytes = self.read_array(offset)?;
        Ok(match self.endian {
            ElfData::Little => u16::from_le_bytes(bytes),
            ElfData::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        let bytes = self.read_array(offset)?;
        Ok(match self.endian {
            ElfData::Little => u32::from_le_bytes(bytes),
            ElfData::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_u64(&self, offset: u64) -> Result<u64> {
        let bytes = self.read_array(offset)?;
        Ok(match self.endian {
            ElfData::Little => u64::from_le_bytes(bytes),
            ElfData::Big => u64::from_be_bytes(bytes),
        })
    }

    pub fn read_i32(&self, offset: u64) -> Result<i32> {
        let bytes = self.read_array(offset)?;
        Ok(match self.endian {
            ElfData::Little => i32::from_le_bytes(bytes),
            ElfData::Big => i32::from_be_bytes(bytes),
        })
    }

    pub fn read_i64(&self, offset: u64) -> Result<i64> {
        let bytes = self.read_array(offset)?;
        Ok(match self.endian {
            ElfData::Little => i64::from_le_bytes(bytes),
            ElfData::Big => i64::from_be_bytes(bytes),
        })
    }

    /// Read a null-terminated string starting at `offset`.
    ///
    /// A missing terminator ends the string at the end of the buffer. Invalid
    /// UTF-8 is replaced rather than rejected.
    pub fn read_cstring(&self, offset: u64) -> Result<String> {
        let size = self.data.len() as u64;
        if offset >= size {
            return Err(ElfError::OutOfBounds {
                offset,
                length: 1,
                size,
            });
        }
        let slice = &self.data[offset as usize..];
        let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
        Ok(String::from_utf8_lossy(&slice[..end]).into_owned())
    }

    /// Sub-view over `[offset, offset + length)` keeping the endianness
    pub fn slice(&self, offset: u64, length: u64) -> Result<ByteStream<'data>> {
        Ok(Self {
            data: self.read(offset, length)?,
            endian: self.endian,
        })
    }
}
