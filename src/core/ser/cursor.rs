// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds-checked read/write cursors over a byte buffer.
//!
//! Every multi-byte accessor takes an explicit [`Endian`]: PROFINET blocks are
//! always big-endian on the wire, while DCE/RPC bodies carry an endianness bit
//! in their header and must be decoded with whatever that bit said. No cursor
//! ever guesses; the caller always states which representation applies.

use super::{SerError, SerResult};

/// Wire byte order for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

macro_rules! impl_write {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type, endian: Endian) -> SerResult<()> {
            if self.offset + $size > self.buffer.len() {
                return Err(SerError::WriteFailed {
                    offset: self.offset,
                    reason: "buffer too small".into(),
                });
            }
            let bytes = match endian {
                Endian::Big => value.to_be_bytes(),
                Endian::Little => value.to_le_bytes(),
            };
            self.buffer[self.offset..self.offset + $size].copy_from_slice(&bytes);
            self.offset += $size;
            Ok(())
        }
    };
}

macro_rules! impl_read {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, endian: Endian) -> SerResult<$type> {
            if self.offset + $size > self.buffer.len() {
                return Err(SerError::ReadFailed {
                    offset: self.offset,
                    reason: "unexpected end of buffer".into(),
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(match endian {
                Endian::Big => <$type>::from_be_bytes(bytes),
                Endian::Little => <$type>::from_le_bytes(bytes),
            })
        }
    };
}

macro_rules! impl_cursor_common {
    ($error_variant:ident, $oob_msg:expr) => {
        pub fn offset(&self) -> usize {
            self.offset
        }

        pub fn set_offset(&mut self, offset: usize) -> SerResult<()> {
            if offset > self.buffer.len() {
                return Err(SerError::$error_variant {
                    offset,
                    reason: $oob_msg.into(),
                });
            }
            self.offset = offset;
            Ok(())
        }

        pub fn remaining(&self) -> usize {
            self.buffer.len().saturating_sub(self.offset)
        }

        pub fn len(&self) -> usize {
            self.buffer.len()
        }

        pub fn is_empty(&self) -> bool {
            self.buffer.is_empty()
        }

        /// Advance to the next `alignment`-byte boundary. PROFINET block
        /// framing requires 16-bit alignment between successive blocks.
        pub fn align(&mut self, alignment: u8) -> SerResult<()> {
            if alignment <= 1 {
                return Ok(());
            }
            let mask = (alignment as usize) - 1;
            let aligned = (self.offset + mask) & !mask;
            if aligned > self.buffer.len() {
                return Err(SerError::$error_variant {
                    offset: aligned,
                    reason: $oob_msg.into(),
                });
            }
            self.offset = aligned;
            Ok(())
        }
    };
}

/// Mutable cursor for writing into a caller-owned buffer.
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_write!(write_u16, u16, 2);
    impl_write!(write_u32, u32, 4);
    impl_write!(write_u64, u64, 8);

    pub fn write_u8(&mut self, value: u8) -> SerResult<()> {
        self.write_bytes(&[value])
    }

    pub fn write_i32(&mut self, value: i32, endian: Endian) -> SerResult<()> {
        self.write_u32(value as u32, endian)
    }

    /// Write raw bytes. Fails rather than overrunning the destination; the
    /// block writer above this layer turns that into a truncate-and-log.
    pub fn write_bytes(&mut self, data: &[u8]) -> SerResult<()> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(SerError::WriteFailed {
                offset: self.offset,
                reason: "buffer too small".into(),
            });
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    /// Overwrite `data.len()` bytes at `at` without moving the cursor — used
    /// to back-patch a reserved length/count field once the body is known.
    pub fn patch_bytes(&mut self, at: usize, data: &[u8]) -> SerResult<()> {
        if at + data.len() > self.buffer.len() {
            return Err(SerError::WriteFailed {
                offset: at,
                reason: "patch out of bounds".into(),
            });
        }
        self.buffer[at..at + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn patch_u16(&mut self, at: usize, value: u16, endian: Endian) -> SerResult<()> {
        let bytes = match endian {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.patch_bytes(at, &bytes)
    }

    pub fn patch_u32(&mut self, at: usize, value: u32, endian: Endian) -> SerResult<()> {
        let bytes = match endian {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.patch_bytes(at, &bytes)
    }

    impl_cursor_common!(WriteFailed, "buffer too small");
}

/// Read-only cursor over a borrowed buffer.
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read!(read_u16, u16, 2);
    impl_read!(read_u32, u32, 4);
    impl_read!(read_u64, u64, 8);

    pub fn read_u8(&mut self) -> SerResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i32(&mut self, endian: Endian) -> SerResult<i32> {
        Ok(self.read_u32(endian)? as i32)
    }

    pub fn read_bytes(&mut self, len: usize) -> SerResult<&'a [u8]> {
        if self.offset + len > self.buffer.len() {
            return Err(SerError::ReadFailed {
                offset: self.offset,
                reason: "unexpected end of buffer".into(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn peek_bytes(&self, len: usize) -> SerResult<&'a [u8]> {
        if self.offset + len > self.buffer.len() {
            return Err(SerError::ReadFailed {
                offset: self.offset,
                reason: "unexpected end of buffer".into(),
            });
        }
        Ok(&self.buffer[self.offset..self.offset + len])
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    impl_cursor_common!(ReadFailed, "unexpected end of buffer");
}
