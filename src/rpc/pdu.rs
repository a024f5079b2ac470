// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DCE/RPC connectionless (`ncadg_ip_udp`) PDU header.
//!
//! PROFINET carries Connect/Release/Read/Write/Control requests over
//! connectionless DCE/RPC on UDP port `0x8894`. The header's `drep[0]`
//! integer-representation byte is the one place in the wire format where the
//! endianness of everything that follows is declared by the sender rather
//! than fixed.

use crate::core::ser::cursor::Endian;
use crate::core::{BlockReader, BlockWriter};
use crate::error::{PnetError, Result};
use crate::types::Uuid;

pub const RPC_VERSION: u8 = 4;
pub const HEADER_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PType {
    Request = 0,
    Response = 2,
    Fault = 3,
    Ack = 7,
    Reject = 10,
    NoCall = 12,
    Fack = 14,
}

impl PType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => PType::Request,
            2 => PType::Response,
            3 => PType::Fault,
            7 => PType::Ack,
            10 => PType::Reject,
            12 => PType::NoCall,
            14 => PType::Fack,
            _ => return None,
        })
    }
}

/// `flags1` bits relevant to PROFINET's usage (last/frag/idempotent).
pub mod flags1 {
    pub const LAST_FRAG: u8 = 0x02;
    pub const FRAG: u8 = 0x04;
    pub const NO_FACK: u8 = 0x08;
    pub const IDEMPOTENT: u8 = 0x20;
}

#[derive(Debug, Clone)]
pub struct RpcHeader {
    pub ptype: PType,
    pub flags1: u8,
    pub object_uuid: Uuid,
    pub interface_uuid: Uuid,
    pub activity_uuid: Uuid,
    pub server_boot_time: u32,
    pub interface_version: u32,
    pub sequence_number: u32,
    pub opnum: u16,
    pub fragment_number: u16,
    pub auth_proto: u8,
    pub serial_number: u8,
    /// Body length, not including this 80-byte header.
    pub fragment_length: u16,
    pub endian: Endian,
}

impl RpcHeader {
    pub fn is_last_fragment(&self) -> bool {
        self.flags1 & flags1::LAST_FRAG != 0
    }

    pub fn is_fragmented(&self) -> bool {
        self.flags1 & flags1::FRAG != 0
    }

    pub fn is_idempotent(&self) -> bool {
        self.flags1 & flags1::IDEMPOTENT != 0
    }
}

/// Parse the 80-byte connectionless header. `drep[0]`'s low bit selects
/// endianness for every multi-byte field from this point on, including the
/// rest of this very header (so the header is re-parsed once the bit is
/// known — a one-pass parser can't know in advance, but the header is small
/// enough this is cheap).
pub fn parse_header(buf: &[u8]) -> Result<(RpcHeader, &[u8])> {
    if buf.len() < HEADER_LEN {
        return Err(PnetError::args_length_invalid());
    }
    let drep0 = buf[4];
    let endian = if drep0 & 0x10 != 0 { Endian::Little } else { Endian::Big };

    let mut r = BlockReader::new(buf, endian);
    let _rpc_vers = r.u8();
    let _rpc_vers_minor = r.u8();
    let ptype_raw = r.u8();
    let flags1 = r.u8();
    let _flags2 = r.u8();
    let _drep = r.bytes(3);
    let _serial_hi = r.u8();
    let object_uuid = Uuid::from_bytes(r.bytes(16).try_into().unwrap_or([0; 16]));
    let interface_uuid = Uuid::from_bytes(r.bytes(16).try_into().unwrap_or([0; 16]));
    let activity_uuid = Uuid::from_bytes(r.bytes(16).try_into().unwrap_or([0; 16]));
    let server_boot_time = r.u32();
    let interface_version = r.u32();
    let sequence_number = r.u32();
    let opnum = r.u16();
    let interface_hint = r.u16();
    let _ = interface_hint;
    let activity_hint = r.u16();
    let _ = activity_hint;
    let fragment_length = r.u16();
    let fragment_number = r.u16();
    let auth_proto = r.u8();
    let serial_number = r.u8();

    if !r.is_ok() {
        return Err(PnetError::args_length_invalid());
    }
    let ptype = PType::from_u8(ptype_raw).ok_or_else(PnetError::unknown_blocks)?;

    let body = &buf[HEADER_LEN..];
    let body = if body.len() >= fragment_length as usize {
        &body[..fragment_length as usize]
    } else {
        return Err(PnetError::args_length_invalid());
    };

    Ok((
        RpcHeader {
            ptype,
            flags1,
            object_uuid,
            interface_uuid,
            activity_uuid,
            server_boot_time,
            interface_version,
            sequence_number,
            opnum,
            fragment_number,
            auth_proto,
            serial_number,
            fragment_length,
            endian,
        },
        body,
    ))
}

pub fn write_header(buf: &mut [u8], header: &RpcHeader, body_len: u16) {
    let mut w = BlockWriter::new(buf, header.endian);
    w.u8(RPC_VERSION);
    w.u8(0);
    w.u8(header.ptype as u8);
    w.u8(header.flags1);
    w.u8(0); // flags2
    let drep0 = if header.endian == Endian::Little { 0x10 } else { 0x00 };
    w.bytes(&[drep0, 0, 0]);
    w.u8(0); // serial_hi
    w.bytes(&header.object_uuid.as_bytes());
    w.bytes(&header.interface_uuid.as_bytes());
    w.bytes(&header.activity_uuid.as_bytes());
    w.u32(header.server_boot_time);
    w.u32(header.interface_version);
    w.u32(header.sequence_number);
    w.u16(header.opnum);
    w.u16(0); // interface_hint
    w.u16(0); // activity_hint
    w.u16(body_len);
    w.u16(header.fragment_number);
    w.u8(header.auth_proto);
    w.u8(header.serial_number);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(endian: Endian) -> RpcHeader {
        RpcHeader {
            ptype: PType::Request,
            flags1: flags1::LAST_FRAG | flags1::IDEMPOTENT,
            object_uuid: Uuid::nil(),
            interface_uuid: Uuid::nil(),
            activity_uuid: Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap(),
            server_boot_time: 42,
            interface_version: 1,
            sequence_number: 7,
            opnum: 1,
            fragment_number: 0,
            auth_proto: 0,
            serial_number: 0,
            fragment_length: 4,
            endian,
        }
    }

    #[test]
    fn header_roundtrip_big_endian() {
        let mut buf = [0u8; HEADER_LEN + 4];
        let header = sample_header(Endian::Big);
        write_header(&mut buf, &header, 4);
        buf[HEADER_LEN..].copy_from_slice(&[1, 2, 3, 4]);
        let (decoded, body) = parse_header(&buf).unwrap();
        assert_eq!(decoded.activity_uuid, header.activity_uuid);
        assert_eq!(decoded.opnum, 1);
        assert!(decoded.is_last_fragment());
        assert!(decoded.is_idempotent());
        assert_eq!(body, &[1, 2, 3, 4]);
    }

    #[test]
    fn header_roundtrip_little_endian() {
        let mut buf = [0u8; HEADER_LEN + 4];
        let header = sample_header(Endian::Little);
        write_header(&mut buf, &header, 4);
        let (decoded, _) = parse_header(&buf).unwrap();
        assert_eq!(decoded.endian, Endian::Little);
        assert_eq!(decoded.sequence_number, 7);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let buf = [0u8; 10];
        assert!(parse_header(&buf).is_err());
    }
}
