// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Link Layer Discovery Protocol.
//!
//! PROFINET uses LLDP purely for topology discovery: the device periodically
//! announces itself (port/chassis ID, station/port name, management
//! address) and tracks one neighbour record per port with a TTL watchdog.
//! There is no negotiation; an expired neighbour is simply dropped.

use crate::core::ser::cursor::Endian;
use crate::core::{BlockReader, BlockWriter};
use crate::types::Mac;

pub const ETHERTYPE_LLDP: u16 = 0x88CC;
pub const LLDP_MULTICAST_MAC: Mac = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E];

/// Default values mandated by the PROFINET profile rather than left to the
/// LLDP defaults.
pub const DEFAULT_TX_INTERVAL_S: u16 = 5;
pub const DEFAULT_HOLD_TIME_S: u16 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum TlvType {
    ChassisId = 1,
    PortId = 2,
    Ttl = 3,
    PortDescription = 4,
    SystemName = 5,
    ManagementAddress = 8,
    OrgSpecific = 127,
    End = 0,
}

/// One neighbour learned on a port, refreshed each time a new LLDP frame
/// arrives and expired by [`LldpPeer::expired`] once TTL elapses with no
/// refresh.
#[derive(Debug, Clone)]
pub struct LldpPeer {
    pub chassis_id: Vec<u8>,
    pub port_id: Vec<u8>,
    pub port_description: Option<String>,
    pub system_name: Option<String>,
    pub management_address: Option<Vec<u8>>,
    /// Absolute expiry time in the caller's `now_us` clock space.
    pub expires_at_us: u64,
}

impl LldpPeer {
    pub fn expired(&self, now_us: u64) -> bool {
        now_us >= self.expires_at_us
    }
}

/// Parse an incoming LLDPDU into a peer record. Returns `None` on a
/// malformed PDU (missing mandatory TLVs) rather than a partially filled
/// peer.
pub fn parse_lldpdu(buf: &[u8], now_us: u64) -> Option<LldpPeer> {
    let mut r = BlockReader::new(buf, Endian::Big);
    let mut chassis_id = None;
    let mut port_id = None;
    let mut ttl_s = None;
    let mut port_description = None;
    let mut system_name = None;
    let mut management_address = None;

    loop {
        if r.remaining() < 2 || !r.is_ok() {
            break;
        }
        let tlv_header = r.u16();
        let tlv_type = (tlv_header >> 9) as u8;
        let tlv_len = (tlv_header & 0x01FF) as usize;
        let value = r.bytes(tlv_len);
        if !r.is_ok() {
            return None;
        }
        match tlv_type {
            x if x == TlvType::ChassisId as u8 => chassis_id = Some(value[1.min(value.len())..].to_vec()),
            x if x == TlvType::PortId as u8 => port_id = Some(value[1.min(value.len())..].to_vec()),
            x if x == TlvType::Ttl as u8 && value.len() >= 2 => {
                ttl_s = Some(u16::from_be_bytes([value[0], value[1]]))
            }
            x if x == TlvType::PortDescription as u8 => {
                port_description = Some(String::from_utf8_lossy(value).into_owned())
            }
            x if x == TlvType::SystemName as u8 => {
                system_name = Some(String::from_utf8_lossy(value).into_owned())
            }
            x if x == TlvType::ManagementAddress as u8 => management_address = Some(value.to_vec()),
            x if x == TlvType::End as u8 => break,
            _ => {} // OrgSpecific / unknown, skip
        }
    }

    let chassis_id = chassis_id?;
    let port_id = port_id?;
    let ttl_s = ttl_s?;
    Some(LldpPeer {
        chassis_id,
        port_id,
        port_description,
        system_name,
        management_address,
        expires_at_us: now_us + u64::from(ttl_s) * 1_000_000,
    })
}

/// Build this device's own LLDPDU (periodic TX).
pub struct LldpIdentity<'a> {
    pub chassis_id: &'a [u8],
    pub port_id: &'a [u8],
    pub ttl_s: u16,
    pub port_description: Option<&'a str>,
    pub system_name: Option<&'a str>,
    pub management_address: Option<&'a [u8]>,
}

pub fn build_lldpdu(buf: &mut [u8], identity: &LldpIdentity<'_>) -> usize {
    let mut w = BlockWriter::new(buf, Endian::Big);
    write_tlv(&mut w, TlvType::ChassisId, &{
        let mut v = vec![7u8]; // subtype: locally assigned
        v.extend_from_slice(identity.chassis_id);
        v
    });
    write_tlv(&mut w, TlvType::PortId, &{
        let mut v = vec![7u8];
        v.extend_from_slice(identity.port_id);
        v
    });
    write_tlv(&mut w, TlvType::Ttl, &identity.ttl_s.to_be_bytes());
    if let Some(desc) = identity.port_description {
        write_tlv(&mut w, TlvType::PortDescription, desc.as_bytes());
    }
    if let Some(name) = identity.system_name {
        write_tlv(&mut w, TlvType::SystemName, name.as_bytes());
    }
    if let Some(addr) = identity.management_address {
        write_tlv(&mut w, TlvType::ManagementAddress, addr);
    }
    w.u16(0); // End TLV: type 0, length 0
    w.offset()
}

fn write_tlv(w: &mut BlockWriter<'_>, tlv_type: TlvType, value: &[u8]) {
    let header = ((tlv_type as u16) << 9) | (value.len() as u16 & 0x01FF);
    w.u16(header);
    w.bytes(value);
}
