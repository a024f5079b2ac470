// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CMRPC: Connect/Release request block parsing and AR allocation
//!.
//!
//! A Connect request body is a sequence of blocks: one `ARBlockReq`, one
//! `IOCRBlockReq` per IOCR, one `ExpectedSubmoduleBlockReq`, and optionally
//! an `AlarmCRBlockReq`. Parsing is best-effort per the latching-reader
//! contract: a malformed block aborts the whole Connect with
//! `ARGSLENGTH_INVALID` rather than partially applying it.

use crate::cm::ConnectionManager;
use crate::core::rt::arena::Handle;
use crate::core::ser::cursor::Endian;
use crate::core::BlockReader;
use crate::error::{PnetError, Result};
use crate::model::{AlarmCrRequest, ApplicationRelation, ArProperties, Iocr, IocrDirection};
use crate::types::Uuid;

pub mod block_type {
    pub const AR_BLOCK_REQ: u16 = 0x0101;
    pub const IOCR_BLOCK_REQ: u16 = 0x0102;
    pub const ALARM_CR_BLOCK_REQ: u16 = 0x0103;
    pub const EXPECTED_SUBMODULE_BLOCK_REQ: u16 = 0x0104;
    pub const AR_BLOCK_RES: u16 = 0x8101;
    pub const IOCR_BLOCK_RES: u16 = 0x8102;
    pub const ALARM_CR_BLOCK_RES: u16 = 0x8103;
    pub const MODULE_DIFF_BLOCK: u16 = 0x0020;
}

pub struct ConnectRequest {
    pub ar_uuid: Uuid,
    pub session_key: u16,
    pub initiator_mac: [u8; 6],
    pub initiator_uuid: Uuid,
    pub initiator_station_name: String,
    pub properties: ArProperties,
    pub iocrs: Vec<Iocr>,
    pub expected_submodules: Vec<(u16, u16, u32)>,
    pub alarm_cr: Option<AlarmCrRequest>,
}

/// Parse a Connect request's block stream.
pub fn parse_connect_request(body: &[u8], endian: Endian) -> Result<ConnectRequest> {
    let mut r = BlockReader::new(body, endian);

    let mut ar_uuid = None;
    let mut session_key = 0u16;
    let mut initiator_mac = [0u8; 6];
    let mut initiator_uuid = Uuid::nil();
    let mut initiator_station_name = String::new();
    let mut properties = ArProperties::default();
    let mut iocrs = Vec::new();
    let mut expected_submodules = Vec::new();
    let mut alarm_cr = None;

    while r.remaining() >= 6 && r.is_ok() {
        let hdr = r.block_header();
        let body_len = hdr.body_len();
        let block_body = r.bytes(body_len);
        if !r.is_ok() {
            break;
        }
        let mut br = BlockReader::new(block_body, endian);
        match hdr.block_type {
            block_type::AR_BLOCK_REQ => {
                let _ar_type = br.u16();
                ar_uuid = Some(Uuid::from_bytes(br.bytes(16).try_into().unwrap_or([0; 16])));
                session_key = br.u16();
                initiator_mac = br.mac();
                initiator_uuid = Uuid::from_bytes(br.bytes(16).try_into().unwrap_or([0; 16]));
                let props = br.u32();
                properties = ArProperties {
                    device_access: props & 0x0000_0001 != 0,
                    pull_module_alarm_allowed: props & 0x0000_0002 != 0,
                    startup_mode_advanced: props & 0x0000_0004 != 0,
                };
                let _activity_timeout_factor = br.u16();
                let _inactive_timeout = br.u16();
                let name_len = br.u16();
                let name_bytes = br.bytes(name_len as usize);
                initiator_station_name = String::from_utf8_lossy(name_bytes).into_owned();
            }
            block_type::IOCR_BLOCK_REQ => {
                let direction = if br.u16() == 1 {
                    IocrDirection::Input
                } else {
                    IocrDirection::Output
                };
                let crep = br.u16();
                let frame_id = br.u16();
                let send_clock_factor = br.u16();
                let reduction_ratio = br.u16();
                let phase = br.u16();
                let _sequence = br.u16();
                let _frame_send_offset = br.u32();
                let watchdog_factor = br.u16();
                let data_hold_factor = br.u16();
                let vlan_raw = br.u16();
                let peer_mac = br.mac();
                iocrs.push(Iocr {
                    crep,
                    frame_id,
                    direction,
                    send_clock_factor,
                    reduction_ratio,
                    phase,
                    data_hold_factor,
                    watchdog_factor,
                    vlan_id: if vlan_raw == 0 { None } else { Some(vlan_raw) },
                    peer_mac,
                    data_objects: Vec::new(),
                    data_status_offset: 0,
                    frame_length: 0,
                });
            }
            block_type::ALARM_CR_BLOCK_REQ => {
                let alarm_cr_type = br.u16();
                let local_alarm_reference = br.u16();
                let _priority = br.u16();
                let max_alarm_data_length = br.u16();
                alarm_cr = Some(AlarmCrRequest {
                    alarm_cr_type,
                    local_alarm_reference,
                    max_alarm_data_length,
                });
            }
            block_type::EXPECTED_SUBMODULE_BLOCK_REQ => {
                let count = br.u16();
                for _ in 0..count {
                    let slot = br.u16();
                    let subslot = br.u16();
                    let submodule_id = br.u32();
                    expected_submodules.push((slot, subslot, submodule_id));
                }
            }
            _ => {
                log::debug!("[cmrpc] ignoring unknown Connect block type {:#06x}", hdr.block_type);
            }
        }
        if !br.is_ok() {
            return Err(PnetError::args_length_invalid());
        }
    }

    if !r.is_ok() {
        return Err(PnetError::args_length_invalid());
    }

    Ok(ConnectRequest {
        ar_uuid: ar_uuid.ok_or_else(PnetError::unknown_blocks)?,
        session_key,
        initiator_mac,
        initiator_uuid,
        initiator_station_name,
        properties,
        iocrs,
        expected_submodules,
        alarm_cr,
    })
}

/// Allocate an AR and its IOCRs from a parsed Connect request. Fails with
/// `no_ar_resources` if either arena is exhausted, leaving the
/// `ConnectionManager` in its prior state (no partial allocation).
pub fn allocate_ar(cm: &mut ConnectionManager, req: ConnectRequest, session: Handle) -> Result<Handle> {
    if cm.find_by_ar_uuid(req.ar_uuid).is_some() {
        return Err(PnetError::state_conflict());
    }
    if cm.ars.len() >= cm.ars.capacity() {
        return Err(PnetError::no_ar_resources());
    }
    if cm.iocrs.len() + req.iocrs.len() > cm.iocrs.capacity() {
        return Err(PnetError::no_ar_resources());
    }

    let mut iocr_handles = Vec::with_capacity(req.iocrs.len());
    for iocr in req.iocrs {
        let handle = cm
            .iocrs
            .insert(iocr)
            .ok_or_else(PnetError::no_ar_resources)?;
        iocr_handles.push(handle);
    }

    let mut ar = ApplicationRelation::new(
        req.ar_uuid,
        req.session_key,
        req.initiator_mac,
        req.initiator_station_name,
        req.initiator_uuid,
        req.properties,
        session,
    );
    ar.iocrs = iocr_handles;
    ar.expected_submodules = req.expected_submodules;
    ar.alarm_cr = req.alarm_cr;

    cm.ars.insert(ar).ok_or_else(PnetError::no_ar_resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BlockWriter;

    fn encode_ar_block_req(uuid: Uuid, name: &str) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let n = {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            w.u16(1); // ar_type: IOCARSingle
            w.bytes(&uuid.as_bytes());
            w.u16(42); // session_key
            w.mac([1, 2, 3, 4, 5, 6]);
            w.bytes(&Uuid::nil().as_bytes());
            w.u32(0); // properties
            w.u16(10); // activity timeout factor
            w.u16(3); // inactive timeout
            w.u16(name.len() as u16);
            w.bytes(name.as_bytes());
            w.offset()
        };
        buf.truncate(n);
        buf
    }

    fn wrap_block(block_type: u16, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; body.len() + 4 + 16];
        let n = {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            let patch = w.begin_block(block_type, 1, 0);
            w.bytes(body);
            w.end_block(patch);
            w.offset()
        };
        buf.truncate(n);
        buf
    }

    #[test]
    fn parses_ar_block_req() {
        let uuid = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let ar_body = encode_ar_block_req(uuid, "plc-1");
        let frame = wrap_block(block_type::AR_BLOCK_REQ, &ar_body);
        let parsed = parse_connect_request(&frame, Endian::Big).unwrap();
        assert_eq!(parsed.ar_uuid, uuid);
        assert_eq!(parsed.session_key, 42);
        assert_eq!(parsed.initiator_station_name, "plc-1");
    }

    #[test]
    fn parses_optional_alarm_cr_block_req() {
        let uuid = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let ar_body = encode_ar_block_req(uuid, "plc-1");
        let mut alarm_cr_body = vec![0u8; 8];
        {
            let mut w = BlockWriter::new(&mut alarm_cr_body, Endian::Big);
            w.u16(1); // alarm_cr_type
            w.u16(7); // local_alarm_reference
            w.u16(0); // priority
            w.u16(200); // max_alarm_data_length
        }
        let mut frame = wrap_block(block_type::AR_BLOCK_REQ, &ar_body);
        frame.extend(wrap_block(block_type::ALARM_CR_BLOCK_REQ, &alarm_cr_body));

        let parsed = parse_connect_request(&frame, Endian::Big).unwrap();
        let alarm_cr = parsed.alarm_cr.expect("alarm CR block should have parsed");
        assert_eq!(alarm_cr.alarm_cr_type, 1);
        assert_eq!(alarm_cr.local_alarm_reference, 7);
        assert_eq!(alarm_cr.max_alarm_data_length, 200);
    }

    #[test]
    fn alarm_cr_is_none_when_not_requested() {
        let uuid = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let ar_body = encode_ar_block_req(uuid, "plc-1");
        let frame = wrap_block(block_type::AR_BLOCK_REQ, &ar_body);
        let parsed = parse_connect_request(&frame, Endian::Big).unwrap();
        assert!(parsed.alarm_cr.is_none());
    }

    #[test]
    fn allocate_ar_rejects_duplicate_uuid() {
        let mut cm = ConnectionManager::new(4, 4);
        let uuid = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let req = ConnectRequest {
            ar_uuid: uuid,
            session_key: 1,
            initiator_mac: [0; 6],
            initiator_uuid: Uuid::nil(),
            initiator_station_name: String::new(),
            properties: ArProperties::default(),
            iocrs: Vec::new(),
            expected_submodules: Vec::new(),
            alarm_cr: None,
        };
        let session = Handle { index: 0, generation: 0 };
        allocate_ar(&mut cm, req, session).unwrap();
        let req2 = ConnectRequest {
            ar_uuid: uuid,
            session_key: 1,
            initiator_mac: [0; 6],
            initiator_uuid: Uuid::nil(),
            initiator_station_name: String::new(),
            properties: ArProperties::default(),
            iocrs: Vec::new(),
            expected_submodules: Vec::new(),
            alarm_cr: None,
        };
        assert!(allocate_ar(&mut cm, req2, session).is_err());
    }
}
