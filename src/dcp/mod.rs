// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Discovery and Configuration Protocol.
//!
//! DCP frames ride directly on Ethernet (no IP) at EtherType `0x8892`. This
//! module parses/builds DCP PDUs and holds the Source Address Match (SAM)
//! lock used to serialize concurrent Set requests from the same controller.

pub mod blocks;
pub mod sam;

pub use blocks::{DcpBlock, DcpOption};
pub use sam::SamLock;

use crate::core::ser::cursor::Endian;
use crate::core::{BlockReader, BlockWriter};
use crate::error::{PnetError, Result};
use crate::types::Mac;

pub const ETHERTYPE_DCP: u16 = 0x8892;

pub const FRAME_ID_GET_SET: u16 = 0xFEFD;
pub const FRAME_ID_IDENTIFY_REQUEST: u16 = 0xFEFE;
pub const FRAME_ID_IDENTIFY_RESPONSE: u16 = 0xFEFF;
pub const FRAME_ID_HELLO: u16 = 0xFEFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceId {
    Get,
    Set,
    Identify,
    Hello,
}

impl ServiceId {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            3 => Some(ServiceId::Get),
            4 => Some(ServiceId::Set),
            5 => Some(ServiceId::Identify),
            6 => Some(ServiceId::Hello),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ServiceId::Get => 3,
            ServiceId::Set => 4,
            ServiceId::Identify => 5,
            ServiceId::Hello => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Request,
    ResponseSuccess,
    ResponseUnsupported,
}

impl ServiceType {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ServiceType::Request),
            1 => Some(ServiceType::ResponseSuccess),
            5 => Some(ServiceType::ResponseUnsupported),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ServiceType::Request => 0,
            ServiceType::ResponseSuccess => 1,
            ServiceType::ResponseUnsupported => 5,
        }
    }
}

/// A decoded DCP header plus its (still block-encoded) payload.
pub struct DcpHeader {
    pub service_id: ServiceId,
    pub service_type: ServiceType,
    pub xid: u32,
    pub response_delay: u16,
    pub data_length: u16,
}

/// Response-delay formula from `pf_dcp_calculate_response_delay`, preserved
/// exactly: spreads simultaneous `IdentifyAll` responses over the window the
/// requester asked for (`response_delay_factor`, in units of 10ms) using the
/// low 16 bits of the device's MAC as the spreading seed. Out-of-range
/// factors collapse to a zero delay — the request is still answered, not
/// dropped.
pub fn calculate_response_delay(mac: Mac, response_delay_factor: u16) -> u32 {
    if response_delay_factor == 0 || response_delay_factor > 6400 {
        return 0;
    }
    let seed = (u16::from(mac[4]) << 8) | u16::from(mac[5]);
    let spread = seed % response_delay_factor;
    u32::from(spread) * 10_000
}

/// Parse a DCP PDU (the bytes following the Ethernet header's EtherType).
pub fn parse_header(buf: &[u8]) -> Result<(DcpHeader, BlockReader<'_>)> {
    let mut r = BlockReader::new(buf, Endian::Big);
    let service_id_raw = r.u8();
    let service_type_raw = r.u8();
    let xid = r.u32();
    let response_delay = r.u16();
    let data_length = r.u16();
    if !r.is_ok() {
        return Err(PnetError::args_length_invalid());
    }
    let service_id = ServiceId::from_u8(service_id_raw).ok_or_else(PnetError::unknown_blocks)?;
    let service_type =
        ServiceType::from_u8(service_type_raw).ok_or_else(PnetError::unknown_blocks)?;
    Ok((
        DcpHeader {
            service_id,
            service_type,
            xid,
            response_delay,
            data_length,
        },
        r,
    ))
}

pub fn write_header(w: &mut BlockWriter<'_>, header: &DcpHeader) -> usize {
    w.u8(header.service_id.to_u8());
    w.u8(header.service_type.to_u8());
    w.u32(header.xid);
    w.u16(header.response_delay);
    let len_pos = w.reserve_u16();
    len_pos
}

pub fn patch_data_length(w: &mut BlockWriter<'_>, len_pos: usize, data_length: u16) {
    w.patch_u16_at(len_pos, data_length);
}
