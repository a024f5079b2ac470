// SPDX-License-Identifier: Apache-2.0 OR MIT

//! PROFINET block codec.
//!
//! Every wire block shares the same four-byte header:
//! `(block_type: u16, block_length: u16, version_high: u8, version_low: u8)`,
//! where `block_length` counts everything *after* the length field (i.e. it
//! includes the two version bytes and the body). [`BlockWriter`] reserves the
//! length field, lets the caller emit the body, then backfills it once the
//! body length is known; [`BlockReader`] reads the header and hands back the
//! declared body length so callers can bound their reads.
//!
//! PROFINET blocks are big-endian; DCE/RPC bodies are whichever endianness
//! the RPC header declared. Both readers/writers below take the fixed
//! [`Endian`] for the PDU they're framing at construction time — callers
//! never mix endianness within one block.

use crate::core::ser::cursor::{Cursor, CursorMut, Endian};
use crate::core::ser::SerError;

/// A decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_type: u16,
    /// Bytes following the length field: `2 (version) + body_len`.
    pub block_length: u16,
    pub version_high: u8,
    pub version_low: u8,
}

impl BlockHeader {
    pub fn body_len(self) -> usize {
        (self.block_length as usize).saturating_sub(2)
    }
}

/// Reader over one PDU's bytes with a latching error.
///
/// Once any read fails (out of bounds, or a caller-flagged structural
/// problem via [`BlockReader::fail`]), every subsequent read is a no-op that
/// returns the same latched error — callers can therefore parse a whole PDU
/// optimistically and check `result()` once at the end instead of threading
/// a `Result` through every field access.
pub struct BlockReader<'a> {
    cursor: Cursor<'a>,
    endian: Endian,
    error: Option<SerError>,
}

impl<'a> BlockReader<'a> {
    pub fn new(buffer: &'a [u8], endian: Endian) -> Self {
        Self {
            cursor: Cursor::new(buffer),
            endian,
            error: None,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn is_eof(&self) -> bool {
        self.cursor.is_eof()
    }

    /// Latch a structural error detected by the caller (e.g. an unknown
    /// block type, or a length field that doesn't match what was parsed).
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(SerError::InvalidData {
                reason: reason.into(),
            });
        }
    }

    /// Current latched error, if any.
    pub fn result(&self) -> Result<(), &SerError> {
        match &self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn latch<T: Default>(&mut self, r: Result<T, SerError>) -> T {
        match r {
            Ok(v) => v,
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
                T::default()
            }
        }
    }

    pub fn u8(&mut self) -> u8 {
        if self.error.is_some() {
            return 0;
        }
        let r = self.cursor.read_u8();
        self.latch(r)
    }

    pub fn u16(&mut self) -> u16 {
        if self.error.is_some() {
            return 0;
        }
        let endian = self.endian;
        let r = self.cursor.read_u16(endian);
        self.latch(r)
    }

    pub fn u32(&mut self) -> u32 {
        if self.error.is_some() {
            return 0;
        }
        let endian = self.endian;
        let r = self.cursor.read_u32(endian);
        self.latch(r)
    }

    pub fn i32(&mut self) -> i32 {
        if self.error.is_some() {
            return 0;
        }
        let endian = self.endian;
        let r = self.cursor.read_i32(endian);
        self.latch(r)
    }

    /// Read `len` raw bytes. On failure (or once already failed), returns an
    /// empty slice.
    pub fn bytes(&mut self, len: usize) -> &'a [u8] {
        if self.error.is_some() {
            return &[];
        }
        match self.cursor.read_bytes(len) {
            Ok(s) => s,
            Err(e) => {
                self.error = Some(e);
                &[]
            }
        }
    }

    pub fn mac(&mut self) -> [u8; 6] {
        let bytes = self.bytes(6);
        let mut out = [0u8; 6];
        if bytes.len() == 6 {
            out.copy_from_slice(bytes);
        }
        out
    }

    pub fn align(&mut self, alignment: u8) {
        if self.error.is_some() {
            return;
        }
        let r = self.cursor.align(alignment);
        let _: () = self.latch(r);
    }

    /// Read and validate the four-byte block header.
    pub fn block_header(&mut self) -> BlockHeader {
        BlockHeader {
            block_type: self.u16(),
            block_length: self.u16(),
            version_high: self.u8(),
            version_low: self.u8(),
        }
    }
}

/// Writer that silently truncates (rather than panicking or corrupting
/// adjacent memory) when the destination is too small, logging a debug
/// event — callers size response buffers generously and are not expected to
/// handle a truncation error inline.
pub struct BlockWriter<'a> {
    cursor: CursorMut<'a>,
    endian: Endian,
}

impl<'a> BlockWriter<'a> {
    pub fn new(buffer: &'a mut [u8], endian: Endian) -> Self {
        Self {
            cursor: CursorMut::new(buffer),
            endian,
        }
    }

    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    fn truncated(&self, what: &str) {
        log::debug!("[block] write truncated: {what} at offset {}", self.cursor.offset());
    }

    pub fn u8(&mut self, v: u8) {
        if self.cursor.write_u8(v).is_err() {
            self.truncated("u8");
        }
    }

    pub fn u16(&mut self, v: u16) {
        let endian = self.endian;
        if self.cursor.write_u16(v, endian).is_err() {
            self.truncated("u16");
        }
    }

    pub fn u32(&mut self, v: u32) {
        let endian = self.endian;
        if self.cursor.write_u32(v, endian).is_err() {
            self.truncated("u32");
        }
    }

    pub fn bytes(&mut self, data: &[u8]) {
        if self.cursor.write_bytes(data).is_err() {
            self.truncated("bytes");
        }
    }

    pub fn mac(&mut self, mac: [u8; 6]) {
        self.bytes(&mac);
    }

    pub fn align(&mut self, alignment: u8) {
        if self.cursor.align(alignment).is_err() {
            self.truncated("align");
        }
    }

    /// Emit a block header with a placeholder length field, returning a
    /// [`BlockLenPatch`] to close out with [`BlockWriter::end_block`].
    pub fn begin_block(&mut self, block_type: u16, version_high: u8, version_low: u8) -> BlockLenPatch {
        self.u16(block_type);
        let len_pos = self.cursor.offset();
        self.u16(0); // placeholder, backfilled in end_block
        self.u8(version_high);
        self.u8(version_low);
        BlockLenPatch {
            len_pos,
            body_start: self.cursor.offset(),
        }
    }

    /// Backfill the length field reserved by `begin_block` now that the body
    /// has been written.
    pub fn end_block(&mut self, patch: BlockLenPatch) {
        let body_len = self.cursor.offset().saturating_sub(patch.body_start);
        let block_length = (body_len + 2) as u16; // +2 for version bytes
        let endian = self.endian;
        if self
            .cursor
            .patch_u16(patch.len_pos, block_length, endian)
            .is_err()
        {
            self.truncated("block length backfill");
        }
    }

    /// Reserve a placeholder `u16`/`u32` to backfill later (NDR array
    /// descriptors, `IodReadResult.record_data_length`, ...).
    pub fn reserve_u16(&mut self) -> usize {
        let pos = self.cursor.offset();
        self.u16(0);
        pos
    }

    pub fn reserve_u32(&mut self) -> usize {
        let pos = self.cursor.offset();
        self.u32(0);
        pos
    }

    pub fn patch_u16_at(&mut self, pos: usize, value: u16) {
        let endian = self.endian;
        if self.cursor.patch_u16(pos, value, endian).is_err() {
            self.truncated("u16 backfill");
        }
    }

    pub fn patch_u32_at(&mut self, pos: usize, value: u32) {
        let endian = self.endian;
        if self.cursor.patch_u32(pos, value, endian).is_err() {
            self.truncated("u32 backfill");
        }
    }
}

/// Token returned by [`BlockWriter::begin_block`]; must be passed to
/// [`BlockWriter::end_block`] to backfill the length field.
pub struct BlockLenPatch {
    len_pos: usize,
    body_start: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_roundtrip() {
        let mut buf = [0u8; 32];
        {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            let patch = w.begin_block(0x0001, 1, 0);
            w.u16(0xBEEF);
            w.u32(0xCAFEBABE);
            w.end_block(patch);
        }
        let mut r = BlockReader::new(&buf, Endian::Big);
        let hdr = r.block_header();
        assert_eq!(hdr.block_type, 0x0001);
        assert_eq!(hdr.block_length, 8); // 2 version + 2 + 4
        assert_eq!(hdr.version_high, 1);
        assert_eq!(r.u16(), 0xBEEF);
        assert_eq!(r.u32(), 0xCAFEBABE);
        assert!(r.is_ok());
    }

    #[test]
    fn reader_latches_on_first_error_and_noops_after() {
        let buf = [0u8, 1]; // only 2 bytes, not enough for a u32
        let mut r = BlockReader::new(&buf, Endian::Big);
        let _ = r.u32();
        assert!(!r.is_ok());
        // further reads are no-ops returning defaults, not panics
        assert_eq!(r.u16(), 0);
        assert_eq!(r.u8(), 0);
        assert!(!r.is_ok());
    }

    #[test]
    fn writer_truncates_silently_on_overflow() {
        let mut buf = [0u8; 2];
        let mut w = BlockWriter::new(&mut buf, Endian::Big);
        w.u16(0x1234);
        w.u8(0xFF); // overflow: truncated, not panicking
        assert_eq!(buf, [0x12, 0x34]);
    }

    #[test]
    fn backpatch_length_matches_body() {
        let mut buf = [0u8; 16];
        let mut w = BlockWriter::new(&mut buf, Endian::Big);
        let patch = w.begin_block(0x10, 1, 0);
        w.bytes(&[1, 2, 3, 4, 5]);
        w.end_block(patch);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 7);
    }
}
